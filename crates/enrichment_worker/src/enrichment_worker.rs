use crate::domain::{BatchEnrichmentService, PipelineObserver};
use crate::nats::{
    create_metadata_response_processor, create_raw_telemetry_processor,
    NatsMetadataRequestProducer, NatsProcessedEventProducer,
};
use common::domain::BatchCache;
use common::nats::{JetStreamConsumer, JetStreamPublisher};
use common::NatsConsumer;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

type ProcessFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

pub type WorkerProcess = Box<dyn FnOnce(CancellationToken) -> ProcessFuture + Send>;

#[derive(Debug, Clone)]
pub struct EnrichmentWorkerConfig {
    pub raw_telemetry_stream: String,
    pub raw_telemetry_subject: String,
    pub metadata_request_subject: String,
    pub metadata_response_stream: String,
    pub metadata_response_subject: String,
    /// Processed events go to `{processed_events_subject}.{device_id}`
    pub processed_events_subject: String,
    pub consumer_name_prefix: String,
    pub nats_batch_size: usize,
    pub nats_batch_wait_secs: u64,
    pub batch_ttl: Duration,
}

/// Wires the enrichment pipeline to its two inbound streams
pub struct EnrichmentWorker {
    raw_consumer: NatsConsumer,
    response_consumer: NatsConsumer,
}

impl EnrichmentWorker {
    pub async fn new(
        consumer_client: Arc<dyn JetStreamConsumer>,
        publisher_client: Arc<dyn JetStreamPublisher>,
        cache: Arc<dyn BatchCache>,
        observer: Arc<dyn PipelineObserver>,
        config: EnrichmentWorkerConfig,
    ) -> anyhow::Result<Self> {
        info!("initializing enrichment worker");

        let request_producer = Arc::new(NatsMetadataRequestProducer::new(
            Arc::clone(&publisher_client),
            config.metadata_request_subject.clone(),
        ));
        let event_producer = Arc::new(NatsProcessedEventProducer::new(
            publisher_client,
            config.processed_events_subject.clone(),
        ));

        let service = Arc::new(BatchEnrichmentService::new(
            cache,
            request_producer,
            event_producer,
            observer,
            config.batch_ttl,
        ));

        let raw_consumer = NatsConsumer::new(
            Arc::clone(&consumer_client),
            &config.raw_telemetry_stream,
            &format!("{}-raw-telemetry", config.consumer_name_prefix),
            &config.raw_telemetry_subject,
            config.nats_batch_size,
            config.nats_batch_wait_secs,
            create_raw_telemetry_processor(Arc::clone(&service)),
        )
        .await?;

        let response_consumer = NatsConsumer::new(
            consumer_client,
            &config.metadata_response_stream,
            &format!("{}-metadata-responses", config.consumer_name_prefix),
            &config.metadata_response_subject,
            config.nats_batch_size,
            config.nats_batch_wait_secs,
            create_metadata_response_processor(service),
        )
        .await?;

        info!(
            batch_ttl_secs = config.batch_ttl.as_secs(),
            "enrichment worker initialized"
        );

        Ok(Self {
            raw_consumer,
            response_consumer,
        })
    }

    /// Named consumer loops to hand to the runner
    pub fn into_runner_processes(self) -> Vec<(String, WorkerProcess)> {
        vec![
            (
                "raw_telemetry_consumer".to_string(),
                consumer_process(self.raw_consumer),
            ),
            (
                "metadata_response_consumer".to_string(),
                consumer_process(self.response_consumer),
            ),
        ]
    }
}

fn consumer_process(consumer: NatsConsumer) -> WorkerProcess {
    Box::new(move |ctx: CancellationToken| -> ProcessFuture {
        Box::pin(async move { consumer.run(ctx).await })
    })
}
