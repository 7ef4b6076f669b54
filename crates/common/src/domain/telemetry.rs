use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Loosely typed telemetry message as it arrives on the raw telemetry stream
///
/// Every field is optional so that a message with a missing field still decodes
/// and can be rejected with a precise reason by the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReading {
    #[serde(default)]
    pub device_id: Option<Uuid>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Each element is expected to be an object of metric name -> number or numeric string
    #[serde(default)]
    pub readings: Option<Vec<serde_json::Value>>,
}

/// A single metric value extracted from a raw reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedReading {
    pub metric_name: String,
    pub value: f64,
}

/// Strongly shaped telemetry event held in the correlation cache while metadata is outstanding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEvent {
    pub device_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub readings: Vec<NormalizedReading>,
}

/// A batch of normalized events tagged with the correlation key minted for it
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEnvelope {
    pub batch_id: String,
    pub events: Vec<NormalizedEvent>,
}

impl BatchEnvelope {
    pub fn new(batch_id: impl Into<String>, events: Vec<NormalizedEvent>) -> Self {
        Self {
            batch_id: batch_id.into(),
            events,
        }
    }

    /// Deduplicated device identifiers referenced by the batch
    pub fn device_ids(&self) -> BTreeSet<Uuid> {
        self.events.iter().map(|event| event.device_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(device_id: Uuid) -> NormalizedEvent {
        NormalizedEvent {
            device_id,
            timestamp: Utc::now(),
            readings: vec![NormalizedReading {
                metric_name: "temperature".to_string(),
                value: 21.0,
            }],
        }
    }

    #[test]
    fn test_device_ids_are_deduplicated() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let envelope = BatchEnvelope::new(
            "batch-1",
            vec![event(first), event(second), event(first)],
        );

        let ids = envelope.device_ids();

        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&first));
        assert!(ids.contains(&second));
    }

    #[test]
    fn test_raw_reading_missing_fields_decode_as_none() {
        let raw: RawReading = serde_json::from_str("{}").unwrap();

        assert_eq!(raw, RawReading::default());
    }

    #[test]
    fn test_normalized_event_uses_camel_case_fields() {
        let device_id = Uuid::new_v4();
        let json = serde_json::to_value(event(device_id)).unwrap();

        assert_eq!(json["deviceId"], device_id.to_string());
        assert_eq!(json["readings"][0]["metricName"], "temperature");
        assert_eq!(json["readings"][0]["value"], 21.0);
    }
}
