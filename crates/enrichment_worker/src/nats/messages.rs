use chrono::{DateTime, Utc};
use common::domain::{EnrichedEvent, EnrichedMetric, GeoLocation, RuleDefinition};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wire shape of a published processed event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedEventMessage {
    pub device_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub metrics: Vec<ProcessedMetricMessage>,
    pub location: Option<GeoLocation>,
    pub device_name: Option<String>,
    pub device_type: Option<String>,
    pub device_status: Option<String>,
    pub rules: Vec<ProcessedRuleMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedMetricMessage {
    pub metric_name: String,
    pub value: f64,
    pub from: Option<f64>,
    pub to: Option<f64>,
    pub is_violating_safety: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedRuleMessage {
    pub rule_name: String,
    pub from: Option<f64>,
    pub to: Option<f64>,
}

impl From<&EnrichedMetric> for ProcessedMetricMessage {
    fn from(metric: &EnrichedMetric) -> Self {
        Self {
            metric_name: metric.metric_name.clone(),
            value: metric.value,
            from: metric.from,
            to: metric.to,
            is_violating_safety: metric.violates_safety,
        }
    }
}

impl From<&RuleDefinition> for ProcessedRuleMessage {
    fn from(rule: &RuleDefinition) -> Self {
        Self {
            rule_name: rule.rule_name.clone(),
            from: rule.from,
            to: rule.to,
        }
    }
}

impl From<&EnrichedEvent> for ProcessedEventMessage {
    fn from(event: &EnrichedEvent) -> Self {
        Self {
            device_id: event.device_id,
            timestamp: event.timestamp,
            metrics: event.metrics.iter().map(Into::into).collect(),
            location: event.location,
            device_name: event.device_name.clone(),
            device_type: event.device_type.clone(),
            device_status: event.device_status.clone(),
            rules: event.rules.iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_wire_shape() {
        let device_id = Uuid::new_v4();
        let event = EnrichedEvent {
            device_id,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            metrics: vec![EnrichedMetric {
                metric_name: "pressure".to_string(),
                value: 1013.25,
                from: None,
                to: None,
                violates_safety: false,
            }],
            location: Some(GeoLocation {
                latitude: 49.19,
                longitude: 16.61,
            }),
            device_name: Some("Boiler".to_string()),
            device_type: None,
            device_status: Some("ACTIVE".to_string()),
            rules: vec![RuleDefinition {
                rule_name: "temperature".to_string(),
                from: Some(15.0),
                to: Some(30.0),
            }],
        };

        let json = serde_json::to_value(ProcessedEventMessage::from(&event)).unwrap();

        assert_eq!(json["deviceId"], device_id.to_string());
        assert_eq!(json["timestamp"], "2024-05-01T12:00:00Z");
        assert_eq!(json["metrics"][0]["metricName"], "pressure");
        assert_eq!(json["metrics"][0]["isViolatingSafety"], false);
        assert!(json["metrics"][0]["from"].is_null());
        assert!(json["metrics"][0]["to"].is_null());
        assert_eq!(json["location"]["latitude"], 49.19);
        assert_eq!(json["deviceName"], "Boiler");
        assert!(json["deviceType"].is_null());
        assert_eq!(json["rules"][0]["ruleName"], "temperature");
        assert_eq!(json["rules"][0]["to"], 30.0);
    }
}
