use crate::domain::metadata::{GeoLocation, RuleDefinition};
use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Metric reading with the safety range that applied to it
///
/// `from`/`to` are `None` when no rule matched the metric name, in which case
/// `violates_safety` is always false.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedMetric {
    pub metric_name: String,
    pub value: f64,
    pub from: Option<f64>,
    pub to: Option<f64>,
    pub violates_safety: bool,
}

/// Domain entity for a telemetry event merged with its device metadata
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedEvent {
    pub device_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub metrics: Vec<EnrichedMetric>,
    pub location: Option<GeoLocation>,
    pub device_name: Option<String>,
    pub device_type: Option<String>,
    pub device_status: Option<String>,
    pub rules: Vec<RuleDefinition>,
}

impl EnrichedEvent {
    pub fn violation_count(&self) -> usize {
        self.metrics.iter().filter(|m| m.violates_safety).count()
    }
}

/// Trait for publishing enriched events to the message broker
///
/// Implementations should:
/// - Map the event to the processed event wire shape (JSON)
/// - Publish to the processed events subject
/// - Return error if serialization or publish fails
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ProcessedEventProducer: Send + Sync {
    async fn publish(&self, event: &EnrichedEvent) -> DomainResult<()>;
}
