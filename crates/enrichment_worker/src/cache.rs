mod correlation_cache;
mod in_memory_key_value_store;

pub use correlation_cache::*;
pub use in_memory_key_value_store::*;
