mod batch_cache;
mod enriched_event;
mod metadata;
mod result;
mod telemetry;

pub use batch_cache::*;
pub use enriched_event::*;
pub use metadata::*;
pub use result::*;
pub use telemetry::*;
