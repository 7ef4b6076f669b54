use crate::domain::BatchEnrichmentService;
use common::domain::MetadataResponse;
use common::nats::{BatchProcessor, ConsumeRequest, ProcessingResult};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

/// Create a BatchProcessor that completes enrichment for each metadata response
///
/// Responses in one fetch belong to independent batches and are completed concurrently.
/// Every message is acknowledged; blank or undecodable ones never reach the service.
pub fn create_metadata_response_processor(service: Arc<BatchEnrichmentService>) -> BatchProcessor {
    Box::new(move |messages: Vec<ConsumeRequest>| {
        let service = Arc::clone(&service);

        Box::pin(async move {
            let count = messages.len();

            let responses: Vec<MetadataResponse> = messages
                .iter()
                .filter_map(decode_response)
                .collect();

            debug!(
                message_count = count,
                response_count = responses.len(),
                "completing metadata responses"
            );

            join_all(
                responses
                    .into_iter()
                    .map(|response| service.complete_enrichment(response)),
            )
            .await;

            Ok(ProcessingResult::ack_all(count))
        })
    })
}

fn decode_response(msg: &ConsumeRequest) -> Option<MetadataResponse> {
    if msg.payload.trim_ascii().is_empty() {
        warn!(subject = %msg.subject, "dropping blank metadata response");
        return None;
    }

    match serde_json::from_slice(&msg.payload) {
        Ok(response) => Some(response),
        Err(e) => {
            warn!(subject = %msg.subject, error = %e, "dropping undecodable metadata response");
            None
        }
    }
}
