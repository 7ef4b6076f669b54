use crate::domain::telemetry::NormalizedEvent;
use async_trait::async_trait;
use std::time::Duration;

/// Prefix shared by every correlation cache key
pub const BATCH_KEY_PREFIX: &str = "batch:";

/// Default time a cached batch stays retrievable
pub const DEFAULT_BATCH_TTL: Duration = Duration::from_secs(600);

/// Logical cache key for a batch ID
pub fn batch_cache_key(batch_id: &str) -> String {
    format!("{BATCH_KEY_PREFIX}{batch_id}")
}

/// Time-bounded storage for batches awaiting their metadata response
///
/// Implementations fail closed: encoding or transport errors are logged and reported
/// as "not stored" / "absent" rather than returned to the caller. Keys are unique per
/// batch, so operations on different batches never conflict.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BatchCache: Send + Sync {
    /// Store events under `batch_id` for at most `ttl`. Returns whether the entry was written.
    async fn put(&self, batch_id: &str, events: &[NormalizedEvent], ttl: Duration) -> bool;

    /// Fetch the events cached under `batch_id`, or `None` if missing, expired or unreadable
    async fn get(&self, batch_id: &str) -> Option<Vec<NormalizedEvent>>;

    /// Remove the entry for `batch_id`. Deleting a missing entry is not an error.
    async fn delete(&self, batch_id: &str);

    /// Fetch and evict the events under `batch_id` in one step, so concurrent
    /// consumers of the same batch see it at most once
    async fn take(&self, batch_id: &str) -> Option<Vec<NormalizedEvent>>;
}
