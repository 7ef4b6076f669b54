use common::domain::{NormalizedEvent, NormalizedReading, RawReading};
use serde_json::Value;
use thiserror::Error;

/// Reasons a single telemetry message cannot be normalized
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizationError {
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("missing device ID")]
    MissingDeviceId,

    #[error("missing timestamp")]
    MissingTimestamp,

    #[error("missing or empty readings")]
    MissingReadings,

    #[error("reading {index} is not a non-empty object")]
    InvalidReading { index: usize },

    #[error("reading {index} has a blank metric name")]
    BlankMetricName { index: usize },

    #[error("metric {metric} has no value")]
    MissingValue { metric: String },

    #[error("metric {metric} has a non-numeric value: {value}")]
    NonNumericValue { metric: String, value: String },

    #[error("metric {metric} has a non-finite value")]
    NonFiniteValue { metric: String },
}

/// A message that was dropped during normalization, by position in its batch
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationFailure {
    pub index: usize,
    pub reason: NormalizationError,
}

/// Normalized events of one raw batch plus the messages that were rejected
#[derive(Debug, Default, PartialEq)]
pub struct NormalizedBatch {
    pub events: Vec<NormalizedEvent>,
    pub failures: Vec<NormalizationFailure>,
}

impl NormalizedBatch {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Normalize one decoded reading.
///
/// Every key of every object in `readings` becomes one reading carrying that key's value.
pub fn normalize_reading(raw: &RawReading) -> Result<NormalizedEvent, NormalizationError> {
    let device_id = raw.device_id.ok_or(NormalizationError::MissingDeviceId)?;
    let timestamp = raw.timestamp.ok_or(NormalizationError::MissingTimestamp)?;

    let entries = match raw.readings.as_deref() {
        Some(entries) if !entries.is_empty() => entries,
        _ => return Err(NormalizationError::MissingReadings),
    };

    let mut readings = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        let fields = match entry {
            Value::Object(fields) if !fields.is_empty() => fields,
            _ => return Err(NormalizationError::InvalidReading { index }),
        };

        for (metric_name, value) in fields {
            if metric_name.trim().is_empty() {
                return Err(NormalizationError::BlankMetricName { index });
            }
            readings.push(NormalizedReading {
                metric_name: metric_name.clone(),
                value: coerce_value(metric_name, value)?,
            });
        }
    }

    Ok(NormalizedEvent {
        device_id,
        timestamp,
        readings,
    })
}

/// Decode and normalize one JSON message
pub fn normalize_message(payload: &[u8]) -> Result<NormalizedEvent, NormalizationError> {
    let raw: RawReading = serde_json::from_slice(payload)
        .map_err(|e| NormalizationError::MalformedMessage(e.to_string()))?;
    normalize_reading(&raw)
}

/// Normalize every message of a batch, collecting failures instead of stopping at the first one
pub fn normalize_batch<P: AsRef<[u8]>>(payloads: &[P]) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    for (index, payload) in payloads.iter().enumerate() {
        match normalize_message(payload.as_ref()) {
            Ok(event) => batch.events.push(event),
            Err(reason) => batch.failures.push(NormalizationFailure { index, reason }),
        }
    }

    batch
}

fn coerce_value(metric: &str, value: &Value) -> Result<f64, NormalizationError> {
    let parsed = match value {
        Value::Null => {
            return Err(NormalizationError::MissingValue {
                metric: metric.to_string(),
            })
        }
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };

    let parsed = parsed.ok_or_else(|| NormalizationError::NonNumericValue {
        metric: metric.to_string(),
        value: value.to_string(),
    })?;

    if !parsed.is_finite() {
        return Err(NormalizationError::NonFiniteValue {
            metric: metric.to_string(),
        });
    }

    Ok(parsed)
}
