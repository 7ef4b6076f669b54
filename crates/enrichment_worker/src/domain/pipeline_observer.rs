use crate::domain::batch_enrichment_service::{BatchOutcome, BatchState, BatchTicket};
use common::domain::EnrichedEvent;
use tracing::{debug, info, warn};

/// Receives read-only snapshots of pipeline progress
///
/// Observers see values after the fact and cannot influence the pipeline.
#[cfg_attr(test, mockall::automock)]
pub trait PipelineObserver: Send + Sync {
    /// A batch was cached and its metadata request published
    fn batch_requested(&self, ticket: &BatchTicket);

    /// An enriched event was published
    fn event_published(&self, event: &EnrichedEvent);

    /// Phase two finished for a batch, whatever the outcome
    fn batch_completed(&self, outcome: &BatchOutcome);
}

/// Emits pipeline snapshots as structured tracing events
#[derive(Debug, Default, Clone)]
pub struct TracingPipelineObserver;

impl PipelineObserver for TracingPipelineObserver {
    fn batch_requested(&self, ticket: &BatchTicket) {
        info!(
            batch_id = %ticket.batch_id,
            event_count = ticket.event_count,
            device_count = ticket.device_count,
            "batch awaiting metadata"
        );
    }

    fn event_published(&self, event: &EnrichedEvent) {
        for metric in &event.metrics {
            if metric.violates_safety {
                warn!(
                    device_id = %event.device_id,
                    metric = %metric.metric_name,
                    value = metric.value,
                    from = ?metric.from,
                    to = ?metric.to,
                    "safety range violated"
                );
            } else {
                debug!(
                    device_id = %event.device_id,
                    metric = %metric.metric_name,
                    value = metric.value,
                    "metric within range"
                );
            }
        }
    }

    fn batch_completed(&self, outcome: &BatchOutcome) {
        match &outcome.state {
            BatchState::Published => info!(
                batch_id = %outcome.batch_id,
                event_count = outcome.event_count,
                published_count = outcome.published_count,
                skipped_count = outcome.skipped_count,
                publish_failures = outcome.publish_failures,
                "batch enrichment completed"
            ),
            BatchState::Abandoned(reason) => warn!(
                batch_id = %outcome.batch_id,
                reason = ?reason,
                event_count = outcome.event_count,
                "batch abandoned"
            ),
        }
    }
}
