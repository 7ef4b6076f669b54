mod client;
mod consumer;
mod key_value;
mod middleware;
mod traits;

pub use client::*;
pub use consumer::*;
pub use key_value::*;
pub use middleware::*;
pub use traits::*;
