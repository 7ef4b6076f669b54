use crate::nats::messages::ProcessedEventMessage;
use async_trait::async_trait;
use common::domain::{DomainError, DomainResult, EnrichedEvent, ProcessedEventProducer};
use common::nats::{JetStreamPublisher, LayeredPublisher, NatsPublisherBuilder, PublishRequest};
use std::sync::Arc;
use tracing::debug;

/// Publishes enriched events to `{base_subject}.{device_id}`
pub struct NatsProcessedEventProducer {
    publisher: LayeredPublisher,
    base_subject: String,
}

impl NatsProcessedEventProducer {
    pub fn new(jetstream: Arc<dyn JetStreamPublisher>, base_subject: String) -> Self {
        debug!(base_subject = %base_subject, "initialized processed event producer");

        let publisher = NatsPublisherBuilder::new(jetstream).with_logging().build();

        Self {
            publisher,
            base_subject,
        }
    }

    fn subject_for(&self, event: &EnrichedEvent) -> String {
        format!("{}.{}", self.base_subject, event.device_id)
    }
}

#[async_trait]
impl ProcessedEventProducer for NatsProcessedEventProducer {
    async fn publish(&self, event: &EnrichedEvent) -> DomainResult<()> {
        let message = PublishRequest::json(self.subject_for(event), &ProcessedEventMessage::from(event))
            .map_err(|e| DomainError::SerializationError(e.to_string()))?;

        self.publisher
            .publish(message)
            .await
            .map_err(DomainError::RepositoryError)?;

        Ok(())
    }
}
