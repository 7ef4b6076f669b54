use async_trait::async_trait;
use common::domain::{DomainError, DomainResult, MetadataRequest, MetadataRequestProducer};
use common::nats::{JetStreamPublisher, LayeredPublisher, NatsPublisherBuilder, PublishRequest};
use std::sync::Arc;
use tracing::debug;

/// Publishes metadata requests as JSON on a single subject
pub struct NatsMetadataRequestProducer {
    publisher: LayeredPublisher,
    subject: String,
}

impl NatsMetadataRequestProducer {
    pub fn new(jetstream: Arc<dyn JetStreamPublisher>, subject: String) -> Self {
        debug!(subject = %subject, "initialized metadata request producer");

        let publisher = NatsPublisherBuilder::new(jetstream).with_logging().build();

        Self { publisher, subject }
    }
}

#[async_trait]
impl MetadataRequestProducer for NatsMetadataRequestProducer {
    async fn publish(&self, request: &MetadataRequest) -> DomainResult<()> {
        let message = PublishRequest::json(self.subject.clone(), request)
            .map_err(|e| DomainError::SerializationError(e.to_string()))?;

        self.publisher
            .publish(message)
            .await
            .map_err(DomainError::RepositoryError)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::nats::MockJetStreamPublisher;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_request_is_published_as_json() {
        let device_id = Uuid::new_v4();
        let expected_device = device_id.to_string();

        let mut mock = MockJetStreamPublisher::new();
        mock.expect_publish_with_headers()
            .withf(move |subject, _, payload| {
                let json: serde_json::Value = serde_json::from_slice(payload).unwrap();
                subject == "metadata_requests.batch"
                    && json["batchId"] == "batch-7"
                    && json["deviceIds"][0] == expected_device.as_str()
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let producer =
            NatsMetadataRequestProducer::new(Arc::new(mock), "metadata_requests.batch".to_string());

        let result = producer
            .publish(&MetadataRequest {
                batch_id: "batch-7".to_string(),
                device_ids: BTreeSet::from([device_id]),
            })
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_publish_failure_is_a_repository_error() {
        let mut mock = MockJetStreamPublisher::new();
        mock.expect_publish_with_headers()
            .returning(|_, _, _| Err(anyhow::anyhow!("stream missing")));

        let producer =
            NatsMetadataRequestProducer::new(Arc::new(mock), "metadata_requests.batch".to_string());

        let result = producer
            .publish(&MetadataRequest {
                batch_id: "batch-7".to_string(),
                device_ids: BTreeSet::new(),
            })
            .await;

        assert!(matches!(result, Err(DomainError::RepositoryError(_))));
    }
}
