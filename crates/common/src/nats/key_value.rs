use crate::nats::traits::KeyValueStore;
use anyhow::{Context, Result};
use async_nats::jetstream::{self, kv};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, warn};

/// Key/value store backed by a JetStream KV bucket.
///
/// Expiry is a bucket property (`max_age`), so every entry lives for the
/// TTL the bucket was opened with.
pub struct NatsKeyValueStore {
    store: kv::Store,
    bucket: String,
    ttl: Duration,
}

impl NatsKeyValueStore {
    pub async fn new(jetstream: &jetstream::Context, bucket: &str, ttl: Duration) -> Result<Self> {
        debug!(bucket = %bucket, ttl_secs = ttl.as_secs(), "initializing key value store");

        let store = match jetstream.get_key_value(bucket).await {
            Ok(store) => {
                debug!(bucket = %bucket, "key value bucket already exists");
                store
            }
            Err(_) => {
                debug!(bucket = %bucket, "creating key value bucket");
                jetstream
                    .create_key_value(kv::Config {
                        bucket: bucket.to_string(),
                        history: 1,
                        max_age: ttl,
                        ..Default::default()
                    })
                    .await
                    .context("failed to create key value bucket")?
            }
        };

        Ok(Self {
            store,
            bucket: bucket.to_string(),
            ttl,
        })
    }
}

/// Map a logical key onto the KV key alphabet (`[-/_=.a-zA-Z0-9]`).
/// `:` becomes the token separator `.`; anything else outside the alphabet becomes `_`.
pub fn kv_safe_key(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            ':' => '.',
            c if c.is_ascii_alphanumeric() || matches!(c, '-' | '/' | '_' | '=' | '.') => c,
            _ => '_',
        })
        .collect()
}

#[async_trait]
impl KeyValueStore for NatsKeyValueStore {
    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        if ttl != self.ttl {
            warn!(
                bucket = %self.bucket,
                requested_secs = ttl.as_secs(),
                bucket_secs = self.ttl.as_secs(),
                "requested ttl differs from bucket max age, bucket max age applies"
            );
        }

        self.store
            .put(kv_safe_key(key), value)
            .await
            .context("failed to put key value entry")?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.store
            .get(kv_safe_key(key))
            .await
            .context("failed to get key value entry")
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store
            .purge(kv_safe_key(key))
            .await
            .context("failed to purge key value entry")?;
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<Bytes>> {
        let key = kv_safe_key(key);

        let entry = match self
            .store
            .entry(key.as_str())
            .await
            .context("failed to read key value entry")?
        {
            Some(entry) if matches!(entry.operation, kv::Operation::Put) => entry,
            _ => return Ok(None),
        };

        // The purge only succeeds against the revision we read, so a concurrent taker loses
        if let Err(e) = self
            .store
            .purge_expect_revision(&key, Some(entry.revision))
            .await
        {
            debug!(
                bucket = %self.bucket,
                key = %key,
                error = %e,
                "entry changed before it could be taken"
            );
            return Ok(None);
        }

        Ok(Some(entry.value))
    }
}
