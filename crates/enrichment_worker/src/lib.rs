pub mod cache;
pub mod domain;
pub mod enrichment_worker;
pub mod nats;

pub use cache::*;
pub use domain::*;
pub use enrichment_worker::*;
pub use nats::*;
