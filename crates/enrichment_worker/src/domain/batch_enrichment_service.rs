use crate::domain::event_enricher::enrich_event;
use crate::domain::pipeline_observer::PipelineObserver;
use common::domain::{
    BatchCache, BatchEnvelope, EnrichedEvent, MetadataRequest, MetadataRequestProducer,
    MetadataResponse, NormalizedEvent, ProcessedEventProducer,
};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Receipt for a batch whose metadata request was published
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTicket {
    pub batch_id: String,
    pub event_count: usize,
    pub device_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    /// The response carried a blank batch ID
    InvalidBatchId,
    /// Nothing cached under the batch ID: never written, expired or already consumed
    CacheMiss,
    /// The response carried no device metadata at all
    MissingMetadata,
    /// No cached event could be merged with metadata
    NoEventsEnriched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Published,
    Abandoned(AbandonReason),
}

/// Snapshot of one phase-two run
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub batch_id: String,
    pub state: BatchState,
    pub event_count: usize,
    pub enriched_count: usize,
    pub published_count: usize,
    pub skipped_count: usize,
    pub publish_failures: usize,
}

impl BatchOutcome {
    fn abandoned(batch_id: &str, reason: AbandonReason, event_count: usize) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            state: BatchState::Abandoned(reason),
            event_count,
            enriched_count: 0,
            published_count: 0,
            skipped_count: event_count,
            publish_failures: 0,
        }
    }

    pub fn is_published(&self) -> bool {
        self.state == BatchState::Published
    }
}

/// Domain service running the two-phase enrichment protocol
///
/// Phase one parks a normalized batch in the correlation cache and asks for device
/// metadata. Phase two takes the batch out of the cache when the metadata response
/// arrives, then merges, evaluates and publishes every event.
pub struct BatchEnrichmentService {
    cache: Arc<dyn BatchCache>,
    request_producer: Arc<dyn MetadataRequestProducer>,
    event_producer: Arc<dyn ProcessedEventProducer>,
    observer: Arc<dyn PipelineObserver>,
    batch_ttl: Duration,
}

impl BatchEnrichmentService {
    pub fn new(
        cache: Arc<dyn BatchCache>,
        request_producer: Arc<dyn MetadataRequestProducer>,
        event_producer: Arc<dyn ProcessedEventProducer>,
        observer: Arc<dyn PipelineObserver>,
        batch_ttl: Duration,
    ) -> Self {
        Self {
            cache,
            request_producer,
            event_producer,
            observer,
            batch_ttl,
        }
    }

    /// Phase one: cache the batch under a fresh ID and request metadata for its devices.
    ///
    /// Returns `None` when nothing was requested (empty batch, failed cache write or
    /// failed request publish).
    #[instrument(skip(self, events), fields(event_count = events.len()))]
    pub async fn enrich_batch(&self, events: Vec<NormalizedEvent>) -> Option<BatchTicket> {
        let (events, dropped): (Vec<_>, Vec<_>) =
            events.into_iter().partition(|event| !event.readings.is_empty());

        for event in &dropped {
            warn!(device_id = %event.device_id, "dropping event without readings");
        }

        if events.is_empty() {
            warn!("received empty telemetry batch, nothing to enrich");
            return None;
        }

        let envelope = BatchEnvelope::new(Uuid::new_v4().to_string(), events);
        let device_ids = envelope.device_ids();

        if !self
            .cache
            .put(&envelope.batch_id, &envelope.events, self.batch_ttl)
            .await
        {
            error!(
                batch_id = %envelope.batch_id,
                "failed to cache batch, skipping metadata request"
            );
            return None;
        }

        let ticket = BatchTicket {
            batch_id: envelope.batch_id.clone(),
            event_count: envelope.events.len(),
            device_count: device_ids.len(),
        };

        let request = MetadataRequest {
            batch_id: envelope.batch_id,
            device_ids,
        };

        if let Err(e) = self.request_producer.publish(&request).await {
            error!(
                batch_id = %request.batch_id,
                error = %e,
                "failed to publish metadata request, evicting batch"
            );
            self.cache.delete(&request.batch_id).await;
            return None;
        }

        debug!(
            batch_id = %ticket.batch_id,
            device_count = ticket.device_count,
            "metadata requested"
        );
        self.observer.batch_requested(&ticket);
        Some(ticket)
    }

    /// Phase two: resume the cached batch named by `response` and publish its enriched events.
    ///
    /// The batch is taken out of the cache in one step, so a batch is consumed at most once
    /// even when duplicate responses are completed concurrently.
    #[instrument(skip(self, response), fields(batch_id = %response.batch_id))]
    pub async fn complete_enrichment(&self, response: MetadataResponse) -> BatchOutcome {
        let outcome = self.resume_batch(response).await;
        self.observer.batch_completed(&outcome);
        outcome
    }

    async fn resume_batch(&self, response: MetadataResponse) -> BatchOutcome {
        let batch_id = response.batch_id;

        if batch_id.trim().is_empty() {
            warn!("metadata response without batch ID, dropping");
            return BatchOutcome::abandoned(&batch_id, AbandonReason::InvalidBatchId, 0);
        }

        let Some(events) = self.cache.take(&batch_id).await else {
            warn!(batch_id = %batch_id, "no cached batch for metadata response");
            return BatchOutcome::abandoned(&batch_id, AbandonReason::CacheMiss, 0);
        };

        let metadata = match response.metadata {
            Some(metadata) if !metadata.is_empty() => metadata,
            _ => {
                warn!(batch_id = %batch_id, "metadata response carried no device metadata");
                return BatchOutcome::abandoned(
                    &batch_id,
                    AbandonReason::MissingMetadata,
                    events.len(),
                );
            }
        };

        let mut enriched: Vec<EnrichedEvent> = Vec::with_capacity(events.len());
        for event in &events {
            let Some(device) = metadata.get(&event.device_id) else {
                warn!(
                    batch_id = %batch_id,
                    device_id = %event.device_id,
                    "no metadata for device, skipping event"
                );
                continue;
            };

            match enrich_event(event, device) {
                Ok(event) => enriched.push(event),
                Err(e) => warn!(
                    batch_id = %batch_id,
                    device_id = %event.device_id,
                    error = %e,
                    "failed to enrich event, skipping"
                ),
            }
        }

        let skipped_count = events.len() - enriched.len();

        if enriched.is_empty() {
            let mut outcome =
                BatchOutcome::abandoned(&batch_id, AbandonReason::NoEventsEnriched, events.len());
            outcome.skipped_count = skipped_count;
            return outcome;
        }

        let results = join_all(enriched.iter().map(|event| self.publish_event(event))).await;
        let published_count = results.iter().filter(|published| **published).count();

        info!(
            batch_id = %batch_id,
            published_count,
            skipped_count,
            "enriched batch published"
        );

        BatchOutcome {
            batch_id,
            state: BatchState::Published,
            event_count: events.len(),
            enriched_count: enriched.len(),
            published_count,
            skipped_count,
            publish_failures: enriched.len() - published_count,
        }
    }

    async fn publish_event(&self, event: &EnrichedEvent) -> bool {
        match self.event_producer.publish(event).await {
            Ok(()) => {
                self.observer.event_published(event);
                true
            }
            Err(e) => {
                error!(
                    device_id = %event.device_id,
                    error = %e,
                    "failed to publish enriched event"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MockPipelineObserver;
    use chrono::Utc;
    use common::domain::{
        DeviceMetadata, DomainError, MockBatchCache, MockMetadataRequestProducer,
        MockProcessedEventProducer, NormalizedReading, RuleDefinition,
    };
    use mockall::predicate::eq;
    use std::collections::HashMap;

    fn event(device_id: Uuid, readings: &[(&str, f64)]) -> NormalizedEvent {
        NormalizedEvent {
            device_id,
            timestamp: Utc::now(),
            readings: readings
                .iter()
                .map(|(name, value)| NormalizedReading {
                    metric_name: name.to_string(),
                    value: *value,
                })
                .collect(),
        }
    }

    fn device(rules: &[(&str, f64, f64)]) -> DeviceMetadata {
        DeviceMetadata {
            device_name: Some("sensor".to_string()),
            rules: rules
                .iter()
                .map(|(name, from, to)| RuleDefinition {
                    rule_name: name.to_string(),
                    from: Some(*from),
                    to: Some(*to),
                })
                .collect(),
            ..Default::default()
        }
    }

    fn quiet_observer() -> MockPipelineObserver {
        let mut observer = MockPipelineObserver::new();
        observer.expect_batch_requested().returning(|_| ());
        observer.expect_event_published().returning(|_| ());
        observer.expect_batch_completed().returning(|_| ());
        observer
    }

    fn service(
        cache: MockBatchCache,
        requests: MockMetadataRequestProducer,
        events: MockProcessedEventProducer,
    ) -> BatchEnrichmentService {
        BatchEnrichmentService::new(
            Arc::new(cache),
            Arc::new(requests),
            Arc::new(events),
            Arc::new(quiet_observer()),
            Duration::from_secs(600),
        )
    }

    #[tokio::test]
    async fn test_enrich_batch_caches_then_requests_deduplicated_devices() {
        let device_a = Uuid::new_v4();
        let device_b = Uuid::new_v4();
        let batch = vec![
            event(device_a, &[("temperature", 20.0)]),
            event(device_b, &[("temperature", 21.0)]),
            event(device_a, &[("humidity", 50.0)]),
        ];

        let mut seq = mockall::Sequence::new();
        let mut cache = MockBatchCache::new();
        cache
            .expect_put()
            .withf(|batch_id: &str, events: &[NormalizedEvent], ttl: &Duration| {
                !batch_id.is_empty() && events.len() == 3 && *ttl == Duration::from_secs(600)
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| true);

        let mut requests = MockMetadataRequestProducer::new();
        requests
            .expect_publish()
            .withf(move |request: &MetadataRequest| {
                request.device_ids.len() == 2
                    && request.device_ids.contains(&device_a)
                    && request.device_ids.contains(&device_b)
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let service = service(cache, requests, MockProcessedEventProducer::new());

        let ticket = service.enrich_batch(batch).await.unwrap();

        assert_eq!(ticket.event_count, 3);
        assert_eq!(ticket.device_count, 2);
        assert!(Uuid::parse_str(&ticket.batch_id).is_ok());
    }

    #[tokio::test]
    async fn test_enrich_batch_mints_unique_batch_ids() {
        let mut cache = MockBatchCache::new();
        cache.expect_put().returning(|_, _, _| true);
        let mut requests = MockMetadataRequestProducer::new();
        requests.expect_publish().returning(|_| Ok(()));

        let service = service(cache, requests, MockProcessedEventProducer::new());
        let device = Uuid::new_v4();

        let first = service.enrich_batch(vec![event(device, &[("a", 1.0)])]).await;
        let second = service.enrich_batch(vec![event(device, &[("a", 1.0)])]).await;

        assert_ne!(first.unwrap().batch_id, second.unwrap().batch_id);
    }

    #[tokio::test]
    async fn test_enrich_batch_ignores_empty_input() {
        let mut cache = MockBatchCache::new();
        cache.expect_put().never();
        let mut requests = MockMetadataRequestProducer::new();
        requests.expect_publish().never();

        let service = service(cache, requests, MockProcessedEventProducer::new());

        assert!(service.enrich_batch(Vec::new()).await.is_none());
        assert!(service
            .enrich_batch(vec![event(Uuid::new_v4(), &[])])
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_failed_cache_write_skips_metadata_request() {
        let mut cache = MockBatchCache::new();
        cache.expect_put().times(1).returning(|_, _, _| false);
        let mut requests = MockMetadataRequestProducer::new();
        requests.expect_publish().never();

        let service = service(cache, requests, MockProcessedEventProducer::new());

        let ticket = service
            .enrich_batch(vec![event(Uuid::new_v4(), &[("a", 1.0)])])
            .await;

        assert!(ticket.is_none());
    }

    #[tokio::test]
    async fn test_failed_request_publish_evicts_batch() {
        let mut cache = MockBatchCache::new();
        cache.expect_put().returning(|_, _, _| true);
        cache.expect_delete().times(1).returning(|_| ());
        let mut requests = MockMetadataRequestProducer::new();
        requests
            .expect_publish()
            .returning(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("no stream"))));

        let service = service(cache, requests, MockProcessedEventProducer::new());

        let ticket = service
            .enrich_batch(vec![event(Uuid::new_v4(), &[("a", 1.0)])])
            .await;

        assert!(ticket.is_none());
    }

    #[tokio::test]
    async fn test_complete_enrichment_takes_batch_and_publishes() {
        let device_id = Uuid::new_v4();
        let cached = vec![event(device_id, &[("temperature", 35.0), ("pressure", 1013.25)])];

        let mut cache = MockBatchCache::new();
        cache
            .expect_take()
            .with(eq("batch-1"))
            .times(1)
            .return_once(move |_| Some(cached));
        cache.expect_get().never();
        cache.expect_delete().never();

        let mut events = MockProcessedEventProducer::new();
        events
            .expect_publish()
            .withf(|event: &EnrichedEvent| {
                event.metrics.len() == 2
                    && event.metrics[0].violates_safety
                    && !event.metrics[1].violates_safety
                    && event.metrics[1].from.is_none()
            })
            .times(1)
            .returning(|_| Ok(()));

        let service = service(cache, MockMetadataRequestProducer::new(), events);

        let outcome = service
            .complete_enrichment(MetadataResponse {
                batch_id: "batch-1".to_string(),
                metadata: Some(HashMap::from([(
                    device_id,
                    device(&[("temperature", 15.0, 30.0)]),
                )])),
            })
            .await;

        assert!(outcome.is_published());
        assert_eq!(outcome.published_count, 1);
        assert_eq!(outcome.skipped_count, 0);
    }

    #[tokio::test]
    async fn test_cache_miss_abandons_without_publishing() {
        let mut cache = MockBatchCache::new();
        cache.expect_take().returning(|_| None);
        cache.expect_delete().never();
        let mut events = MockProcessedEventProducer::new();
        events.expect_publish().never();

        let service = service(cache, MockMetadataRequestProducer::new(), events);

        let outcome = service
            .complete_enrichment(MetadataResponse {
                batch_id: "unknown".to_string(),
                metadata: Some(HashMap::from([(Uuid::new_v4(), device(&[]))])),
            })
            .await;

        assert_eq!(outcome.state, BatchState::Abandoned(AbandonReason::CacheMiss));
    }

    #[tokio::test]
    async fn test_blank_batch_id_never_touches_cache() {
        let mut cache = MockBatchCache::new();
        cache.expect_take().never();

        let service = service(
            cache,
            MockMetadataRequestProducer::new(),
            MockProcessedEventProducer::new(),
        );

        let outcome = service
            .complete_enrichment(MetadataResponse {
                batch_id: "  ".to_string(),
                metadata: None,
            })
            .await;

        assert_eq!(
            outcome.state,
            BatchState::Abandoned(AbandonReason::InvalidBatchId)
        );
    }

    #[tokio::test]
    async fn test_missing_or_empty_metadata_consumes_and_abandons() {
        for metadata in [None, Some(HashMap::new())] {
            let mut cache = MockBatchCache::new();
            cache
                .expect_take()
                .times(1)
                .returning(|_| Some(vec![event(Uuid::new_v4(), &[("a", 1.0)])]));
            let mut events = MockProcessedEventProducer::new();
            events.expect_publish().never();

            let service = service(cache, MockMetadataRequestProducer::new(), events);

            let outcome = service
                .complete_enrichment(MetadataResponse {
                    batch_id: "batch-1".to_string(),
                    metadata,
                })
                .await;

            assert_eq!(
                outcome.state,
                BatchState::Abandoned(AbandonReason::MissingMetadata)
            );
            assert_eq!(outcome.event_count, 1);
        }
    }

    #[tokio::test]
    async fn test_one_failed_publish_does_not_stop_siblings() {
        let failing = Uuid::new_v4();
        let healthy = Uuid::new_v4();
        let cached = vec![
            event(failing, &[("a", 1.0)]),
            event(healthy, &[("a", 2.0)]),
        ];

        let mut cache = MockBatchCache::new();
        cache.expect_take().return_once(move |_| Some(cached));

        let mut events = MockProcessedEventProducer::new();
        events.expect_publish().times(2).returning(move |event| {
            if event.device_id == failing {
                Err(DomainError::RepositoryError(anyhow::anyhow!("timeout")))
            } else {
                Ok(())
            }
        });

        let service = service(cache, MockMetadataRequestProducer::new(), events);

        let outcome = service
            .complete_enrichment(MetadataResponse {
                batch_id: "batch-1".to_string(),
                metadata: Some(HashMap::from([
                    (failing, device(&[("a", 0.0, 5.0)])),
                    (healthy, device(&[("a", 0.0, 5.0)])),
                ])),
            })
            .await;

        assert!(outcome.is_published());
        assert_eq!(outcome.published_count, 1);
        assert_eq!(outcome.publish_failures, 1);
    }

    #[tokio::test]
    async fn test_unmappable_events_are_skipped_individually() {
        let good = Uuid::new_v4();
        let bad_rules = Uuid::new_v4();
        let cached = vec![event(good, &[("a", 1.0)]), event(bad_rules, &[("a", 1.0)])];

        let mut cache = MockBatchCache::new();
        cache.expect_take().return_once(move |_| Some(cached));

        let mut events = MockProcessedEventProducer::new();
        events
            .expect_publish()
            .withf(move |event: &EnrichedEvent| event.device_id == good)
            .times(1)
            .returning(|_| Ok(()));

        let service = service(cache, MockMetadataRequestProducer::new(), events);

        let outcome = service
            .complete_enrichment(MetadataResponse {
                batch_id: "batch-1".to_string(),
                metadata: Some(HashMap::from([
                    (good, device(&[("a", 0.0, 2.0)])),
                    (bad_rules, device(&[("", 0.0, 2.0)])),
                ])),
            })
            .await;

        assert_eq!(outcome.published_count, 1);
        assert_eq!(outcome.skipped_count, 1);
    }

    #[tokio::test]
    async fn test_device_without_rules_is_skipped_and_siblings_publish() {
        let ruled = Uuid::new_v4();
        let unruled = Uuid::new_v4();
        let cached = vec![
            event(ruled, &[("temperature", 20.0)]),
            event(unruled, &[("temperature", 20.0)]),
        ];

        let mut cache = MockBatchCache::new();
        cache.expect_take().return_once(move |_| Some(cached));

        let mut events = MockProcessedEventProducer::new();
        events
            .expect_publish()
            .withf(move |event: &EnrichedEvent| event.device_id == ruled)
            .times(1)
            .returning(|_| Ok(()));

        let service = service(cache, MockMetadataRequestProducer::new(), events);

        let outcome = service
            .complete_enrichment(MetadataResponse {
                batch_id: "batch-1".to_string(),
                metadata: Some(HashMap::from([
                    (ruled, device(&[("temperature", 15.0, 30.0)])),
                    (unruled, device(&[])),
                ])),
            })
            .await;

        assert!(outcome.is_published());
        assert_eq!(outcome.published_count, 1);
        assert_eq!(outcome.skipped_count, 1);
    }

    #[tokio::test]
    async fn test_no_enrichable_events_abandons_batch() {
        let cached = vec![event(Uuid::new_v4(), &[("a", 1.0)])];

        let mut cache = MockBatchCache::new();
        cache.expect_take().return_once(move |_| Some(cached));
        let mut events = MockProcessedEventProducer::new();
        events.expect_publish().never();

        let service = service(cache, MockMetadataRequestProducer::new(), events);

        let outcome = service
            .complete_enrichment(MetadataResponse {
                batch_id: "batch-1".to_string(),
                metadata: Some(HashMap::from([(Uuid::new_v4(), device(&[]))])),
            })
            .await;

        assert_eq!(
            outcome.state,
            BatchState::Abandoned(AbandonReason::NoEventsEnriched)
        );
        assert_eq!(outcome.skipped_count, 1);
    }

    #[tokio::test]
    async fn test_observer_sees_every_outcome() {
        let mut cache = MockBatchCache::new();
        cache.expect_take().returning(|_| None);

        let mut observer = MockPipelineObserver::new();
        observer
            .expect_batch_completed()
            .withf(|outcome: &BatchOutcome| {
                outcome.state == BatchState::Abandoned(AbandonReason::CacheMiss)
            })
            .times(1)
            .returning(|_| ());

        let service = BatchEnrichmentService::new(
            Arc::new(cache),
            Arc::new(MockMetadataRequestProducer::new()),
            Arc::new(MockProcessedEventProducer::new()),
            Arc::new(observer),
            Duration::from_secs(600),
        );

        service
            .complete_enrichment(MetadataResponse {
                batch_id: "gone".to_string(),
                metadata: None,
            })
            .await;
    }
}
