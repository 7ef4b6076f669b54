use crate::domain::safety_evaluator::evaluate;
use common::domain::{DeviceMetadata, DomainError, DomainResult, EnrichedEvent, NormalizedEvent};

/// Merge one normalized event with its device metadata, evaluating every reading.
///
/// Fails for an event without readings, for a device without rules, and when a rule in the
/// device's list has a blank name.
pub fn enrich_event(event: &NormalizedEvent, metadata: &DeviceMetadata) -> DomainResult<EnrichedEvent> {
    if event.readings.is_empty() {
        return Err(DomainError::EnrichmentError(format!(
            "event for device {} has no readings",
            event.device_id
        )));
    }

    if metadata.rules.is_empty() {
        return Err(DomainError::EnrichmentError(format!(
            "no rules found for device {}",
            event.device_id
        )));
    }

    if let Some(position) = metadata
        .rules
        .iter()
        .position(|rule| rule.rule_name.trim().is_empty())
    {
        return Err(DomainError::EnrichmentError(format!(
            "device {} has a rule without a name at position {position}",
            event.device_id
        )));
    }

    let metrics = event
        .readings
        .iter()
        .map(|reading| evaluate(reading, &metadata.rules))
        .collect();

    Ok(EnrichedEvent {
        device_id: event.device_id,
        timestamp: event.timestamp,
        metrics,
        location: metadata.location,
        device_name: metadata.device_name.clone(),
        device_type: metadata.device_type.clone(),
        device_status: metadata.device_status.clone(),
        rules: metadata.rules.clone(),
    })
}
