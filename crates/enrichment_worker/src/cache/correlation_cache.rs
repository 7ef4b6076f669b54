use async_trait::async_trait;
use bytes::Bytes;
use common::domain::{batch_cache_key, BatchCache, NormalizedEvent};
use common::nats::KeyValueStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// [`BatchCache`] over any key/value store, storing each batch as a JSON array of events
pub struct CorrelationCache {
    store: Arc<dyn KeyValueStore>,
}

impl CorrelationCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

fn is_blank(batch_id: &str) -> bool {
    batch_id.trim().is_empty()
}

#[async_trait]
impl BatchCache for CorrelationCache {
    async fn put(&self, batch_id: &str, events: &[NormalizedEvent], ttl: Duration) -> bool {
        if is_blank(batch_id) {
            warn!("refusing to cache batch with blank ID");
            return false;
        }

        let payload = match serde_json::to_vec(events) {
            Ok(payload) => Bytes::from(payload),
            Err(e) => {
                error!(batch_id = %batch_id, error = %e, "failed to encode batch");
                return false;
            }
        };

        match self.store.put(&batch_cache_key(batch_id), payload, ttl).await {
            Ok(()) => {
                debug!(batch_id = %batch_id, ttl_secs = ttl.as_secs(), "batch cached");
                true
            }
            Err(e) => {
                error!(batch_id = %batch_id, error = %e, "failed to write batch to cache");
                false
            }
        }
    }

    async fn get(&self, batch_id: &str) -> Option<Vec<NormalizedEvent>> {
        if is_blank(batch_id) {
            warn!("refusing to read batch with blank ID");
            return None;
        }

        decode_batch(batch_id, self.store.get(&batch_cache_key(batch_id)).await)
    }

    async fn delete(&self, batch_id: &str) {
        if is_blank(batch_id) {
            warn!("refusing to delete batch with blank ID");
            return;
        }

        if let Err(e) = self.store.delete(&batch_cache_key(batch_id)).await {
            error!(batch_id = %batch_id, error = %e, "failed to evict batch from cache");
        }
    }

    async fn take(&self, batch_id: &str) -> Option<Vec<NormalizedEvent>> {
        if is_blank(batch_id) {
            warn!("refusing to take batch with blank ID");
            return None;
        }

        decode_batch(batch_id, self.store.take(&batch_cache_key(batch_id)).await)
    }
}

fn decode_batch(
    batch_id: &str,
    read: anyhow::Result<Option<Bytes>>,
) -> Option<Vec<NormalizedEvent>> {
    let payload = match read {
        Ok(Some(payload)) => payload,
        Ok(None) => {
            debug!(batch_id = %batch_id, "batch not in cache");
            return None;
        }
        Err(e) => {
            error!(batch_id = %batch_id, error = %e, "failed to read batch from cache");
            return None;
        }
    };

    match serde_json::from_slice(&payload) {
        Ok(events) => Some(events),
        Err(e) => {
            error!(batch_id = %batch_id, error = %e, "failed to decode cached batch");
            None
        }
    }
}
