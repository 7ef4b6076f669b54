use crate::domain::{normalize_batch, BatchEnrichmentService};
use common::nats::{BatchProcessor, ConsumeRequest, ProcessingResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Create a BatchProcessor that treats each fetched set of raw telemetry messages as one batch
///
/// Every message is acknowledged; malformed ones are logged and dropped.
pub fn create_raw_telemetry_processor(service: Arc<BatchEnrichmentService>) -> BatchProcessor {
    Box::new(move |messages: Vec<ConsumeRequest>| {
        let service = Arc::clone(&service);

        Box::pin(async move {
            let count = messages.len();

            let payloads: Vec<_> = messages
                .iter()
                .filter(|msg| {
                    let blank = msg.payload.trim_ascii().is_empty();
                    if blank {
                        warn!(subject = %msg.subject, "dropping blank telemetry message");
                    }
                    !blank
                })
                .map(|msg| msg.payload.clone())
                .collect();

            let batch = normalize_batch(&payloads);

            for failure in &batch.failures {
                warn!(
                    index = failure.index,
                    reason = %failure.reason,
                    "dropping malformed telemetry message"
                );
            }

            if batch.is_empty() {
                debug!(message_count = count, "no valid telemetry in batch");
                return Ok(ProcessingResult::ack_all(count));
            }

            match service.enrich_batch(batch.events).await {
                Some(ticket) => info!(
                    batch_id = %ticket.batch_id,
                    event_count = ticket.event_count,
                    dropped = batch.failures.len(),
                    "telemetry batch submitted for enrichment"
                ),
                None => warn!(message_count = count, "telemetry batch was not submitted"),
            }

            Ok(ProcessingResult::ack_all(count))
        })
    })
}
