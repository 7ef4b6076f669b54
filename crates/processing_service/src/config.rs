use common::domain::DEFAULT_BATCH_TTL;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where correlation cache entries live
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// JetStream key/value bucket shared by every instance
    NatsKv,
    /// Process-local store; only correct for a single instance
    InMemory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines
    #[serde(default = "default_log_json")]
    pub log_json: bool,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Stream holding raw telemetry
    #[serde(default = "default_raw_telemetry_stream")]
    pub raw_telemetry_stream: String,

    /// Consumer filter for raw telemetry
    #[serde(default = "default_raw_telemetry_subject")]
    pub raw_telemetry_subject: String,

    /// Stream holding outbound metadata requests
    #[serde(default = "default_metadata_request_stream")]
    pub metadata_request_stream: String,

    /// Subject metadata requests are published to
    #[serde(default = "default_metadata_request_subject")]
    pub metadata_request_subject: String,

    /// Stream holding metadata responses
    #[serde(default = "default_metadata_response_stream")]
    pub metadata_response_stream: String,

    /// Consumer filter for metadata responses
    #[serde(default = "default_metadata_response_subject")]
    pub metadata_response_subject: String,

    /// Stream processed events are published to, one subject per device
    #[serde(default = "default_processed_events_stream")]
    pub processed_events_stream: String,

    /// Prefix for durable consumer names
    #[serde(default = "default_consumer_name_prefix")]
    pub consumer_name_prefix: String,

    /// Batch size for consumers
    #[serde(default = "default_nats_batch_size")]
    pub nats_batch_size: usize,

    /// Max wait time for batches in seconds
    #[serde(default = "default_nats_batch_wait_secs")]
    pub nats_batch_wait_secs: u64,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    // Correlation cache configuration
    #[serde(default = "default_cache_backend")]
    pub cache_backend: CacheBackend,

    /// Key/value bucket for in-flight batches
    #[serde(default = "default_batch_cache_bucket")]
    pub batch_cache_bucket: String,

    /// Seconds a batch waits for its metadata before it is dropped
    #[serde(default = "default_batch_cache_ttl_secs")]
    pub batch_cache_ttl_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_json() -> bool {
    true
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_raw_telemetry_stream() -> String {
    "raw_telemetry".to_string()
}

fn default_raw_telemetry_subject() -> String {
    "raw_telemetry.*".to_string()
}

fn default_metadata_request_stream() -> String {
    "metadata_requests".to_string()
}

fn default_metadata_request_subject() -> String {
    "metadata_requests.batch".to_string()
}

fn default_metadata_response_stream() -> String {
    "metadata_responses".to_string()
}

fn default_metadata_response_subject() -> String {
    "metadata_responses.*".to_string()
}

fn default_processed_events_stream() -> String {
    "processed_events".to_string()
}

fn default_consumer_name_prefix() -> String {
    "processing-service".to_string()
}

fn default_nats_batch_size() -> usize {
    30
}

fn default_nats_batch_wait_secs() -> u64 {
    5
}

fn default_startup_timeout_secs() -> u64 {
    30
}

fn default_cache_backend() -> CacheBackend {
    CacheBackend::NatsKv
}

fn default_batch_cache_bucket() -> String {
    "enrichment_batches".to_string()
}

fn default_batch_cache_ttl_secs() -> u64 {
    DEFAULT_BATCH_TTL.as_secs()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("PROCESSING"))
            .build()?
            .try_deserialize()
    }

    pub fn batch_ttl(&self) -> Duration {
        Duration::from_secs(self.batch_cache_ttl_secs)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}
