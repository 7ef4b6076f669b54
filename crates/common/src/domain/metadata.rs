use crate::domain::result::DomainResult;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;
use uuid::Uuid;

/// Request asking the metadata service to describe a set of devices
///
/// The answer is correlated back to the cached batch through `batch_id` only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRequest {
    pub batch_id: String,
    pub device_ids: BTreeSet<Uuid>,
}

/// Answer from the metadata service for one batch
///
/// `metadata` may cover only part of the requested devices, or be missing entirely.
/// Device entries that fail to decode are dropped on their own, so the remaining
/// devices of the batch can still be enriched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataResponse {
    #[serde(default)]
    pub batch_id: String,
    #[serde(default, deserialize_with = "decode_devices")]
    pub metadata: Option<HashMap<Uuid, DeviceMetadata>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Inclusive safety range for the metric whose name equals `rule_name`
///
/// A missing bound leaves the range open, and a metric under such a rule is never flagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    #[serde(rename = "rule_name", alias = "ruleName")]
    pub rule_name: String,
    #[serde(default)]
    pub from: Option<f64>,
    #[serde(default)]
    pub to: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMetadata {
    #[serde(default)]
    pub location: Option<GeoLocation>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub device_status: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub rules: Vec<RuleDefinition>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<RuleDefinition>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<RuleDefinition>>::deserialize(deserializer)?.unwrap_or_default())
}

fn decode_devices<'de, D>(
    deserializer: D,
) -> Result<Option<HashMap<Uuid, DeviceMetadata>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(entries) = Option::<HashMap<String, serde_json::Value>>::deserialize(deserializer)?
    else {
        return Ok(None);
    };

    let mut devices = HashMap::with_capacity(entries.len());
    for (key, value) in entries {
        let device_id = match Uuid::parse_str(&key) {
            Ok(device_id) => device_id,
            Err(e) => {
                warn!(device_id = %key, error = %e, "dropping metadata for invalid device ID");
                continue;
            }
        };

        match serde_json::from_value::<DeviceMetadata>(value) {
            Ok(metadata) => {
                devices.insert(device_id, metadata);
            }
            Err(e) => {
                warn!(device_id = %device_id, error = %e, "dropping undecodable device metadata");
            }
        }
    }

    Ok(Some(devices))
}

/// Trait for publishing metadata requests to the message broker
///
/// Implementations should:
/// - Serialize the request to the wire format (JSON)
/// - Publish to the metadata request subject
/// - Return error if serialization or publish fails; the caller decides whether to continue
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MetadataRequestProducer: Send + Sync {
    async fn publish(&self, request: &MetadataRequest) -> DomainResult<()>;
}
