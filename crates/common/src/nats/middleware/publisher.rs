use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use super::types::{PublishRequest, PublishResponse};
use super::{NatsPublishLoggingLayer, NatsPublishLoggingService};
use crate::nats::JetStreamPublisher;
use anyhow::Result;
use tower::{Service, ServiceBuilder, ServiceExt};

/// Innermost service that hands the request to JetStream
#[derive(Clone)]
pub struct NatsPublishService {
    publisher: Arc<dyn JetStreamPublisher>,
}

impl NatsPublishService {
    pub fn new(publisher: Arc<dyn JetStreamPublisher>) -> Self {
        Self { publisher }
    }
}

impl Service<PublishRequest> for NatsPublishService {
    type Response = PublishResponse;
    type Error = anyhow::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: PublishRequest) -> Self::Future {
        let publisher = Arc::clone(&self.publisher);
        let subject = req.subject.clone();

        Box::pin(async move {
            publisher
                .publish_with_headers(subject.clone(), req.headers, req.payload)
                .await?;
            Ok(PublishResponse { subject })
        })
    }
}

/// Builder for a layered NATS publisher service
pub struct NatsPublisherBuilder {
    publisher: Arc<dyn JetStreamPublisher>,
    with_logging: bool,
}

impl NatsPublisherBuilder {
    pub fn new(publisher: Arc<dyn JetStreamPublisher>) -> Self {
        Self {
            publisher,
            with_logging: false,
        }
    }

    pub fn with_logging(mut self) -> Self {
        self.with_logging = true;
        self
    }

    pub fn build(self) -> LayeredPublisher {
        let inner = NatsPublishService::new(self.publisher);

        if self.with_logging {
            let svc = ServiceBuilder::new()
                .layer(NatsPublishLoggingLayer::new())
                .service(inner);
            LayeredPublisher::Logging(svc)
        } else {
            LayeredPublisher::Plain(inner)
        }
    }
}

/// Concrete publisher stack returned by [`NatsPublisherBuilder`]
#[derive(Clone)]
pub enum LayeredPublisher {
    Logging(NatsPublishLoggingService<NatsPublishService>),
    Plain(NatsPublishService),
}

impl LayeredPublisher {
    /// Drive one request through a clone of the stack
    pub async fn publish(&self, req: PublishRequest) -> Result<PublishResponse> {
        self.clone().oneshot(req).await
    }
}

impl Service<PublishRequest> for LayeredPublisher {
    type Response = PublishResponse;
    type Error = anyhow::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        match self {
            LayeredPublisher::Logging(svc) => svc.poll_ready(cx),
            LayeredPublisher::Plain(svc) => svc.poll_ready(cx),
        }
    }

    fn call(&mut self, req: PublishRequest) -> Self::Future {
        match self {
            LayeredPublisher::Logging(svc) => svc.call(req),
            LayeredPublisher::Plain(svc) => svc.call(req),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nats::MockJetStreamPublisher;

    #[tokio::test]
    async fn test_logging_stack_forwards_subject_and_payload() {
        let mut mock = MockJetStreamPublisher::new();
        mock.expect_publish_with_headers()
            .withf(|subject, _, payload| {
                subject == "metadata_requests.batch" && &payload[..] == b"hello"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let publisher = NatsPublisherBuilder::new(Arc::new(mock))
            .with_logging()
            .build();

        let response = publisher
            .publish(PublishRequest::new("metadata_requests.batch", "hello"))
            .await
            .unwrap();

        assert_eq!(response.subject, "metadata_requests.batch");
    }

    #[tokio::test]
    async fn test_publish_error_is_propagated() {
        let mut mock = MockJetStreamPublisher::new();
        mock.expect_publish_with_headers()
            .returning(|_, _, _| Err(anyhow::anyhow!("no responders")));

        let publisher = NatsPublisherBuilder::new(Arc::new(mock)).build();

        let result = publisher
            .publish(PublishRequest::new("processed_events.x", "{}"))
            .await;

        assert!(result.is_err());
    }
}
