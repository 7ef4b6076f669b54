mod config;

use common::domain::BatchCache;
use common::nats::{KeyValueStore, NatsClient};
use common::telemetry::{init_logging, TelemetryConfig};
use config::{CacheBackend, ServiceConfig};
use enrichment_worker::{
    CorrelationCache, EnrichmentWorker, EnrichmentWorkerConfig, InMemoryKeyValueStore,
    TracingPipelineObserver,
};
use std::sync::Arc;
use std::time::Duration;
use telemetry_runner::Runner;
use tracing::{debug, error, info, warn};

const SERVICE_NAME: &str = "processing-service";

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&TelemetryConfig {
        service_name: SERVICE_NAME.to_string(),
        log_level: config.log_level.clone(),
        json: config.log_json,
    }) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!(
        nats_url = %config.nats_url,
        cache_backend = ?config.cache_backend,
        "starting processing service"
    );
    debug!("configuration: {:?}", config);

    let nats_client = match initialize_nats(&config).await {
        Ok(client) => client,
        Err(e) => {
            error!("failed to initialize nats: {}", e);
            std::process::exit(1);
        }
    };

    let cache = match create_batch_cache(&nats_client, &config).await {
        Ok(cache) => cache,
        Err(e) => {
            error!("failed to initialize batch cache: {}", e);
            std::process::exit(1);
        }
    };

    let worker = match EnrichmentWorker::new(
        nats_client.create_consumer_client(),
        nats_client.create_publisher_client(),
        cache,
        Arc::new(TracingPipelineObserver),
        EnrichmentWorkerConfig {
            raw_telemetry_stream: config.raw_telemetry_stream.clone(),
            raw_telemetry_subject: config.raw_telemetry_subject.clone(),
            metadata_request_subject: config.metadata_request_subject.clone(),
            metadata_response_stream: config.metadata_response_stream.clone(),
            metadata_response_subject: config.metadata_response_subject.clone(),
            processed_events_subject: config.processed_events_stream.clone(),
            consumer_name_prefix: config.consumer_name_prefix.clone(),
            nats_batch_size: config.nats_batch_size,
            nats_batch_wait_secs: config.nats_batch_wait_secs,
            batch_ttl: config.batch_ttl(),
        },
    )
    .await
    {
        Ok(worker) => worker,
        Err(e) => {
            error!("failed to initialize enrichment worker: {}", e);
            std::process::exit(1);
        }
    };

    let mut runner = Runner::new();
    for (name, process) in worker.into_runner_processes() {
        runner = runner.with_named_process(name, process);
    }

    runner = runner
        .with_closer(move || {
            Box::pin(async move {
                info!("running cleanup tasks");
                match Arc::try_unwrap(nats_client) {
                    Ok(client) => client.close().await,
                    Err(_) => warn!("nats client still shared, skipping flush"),
                }
                info!("cleanup complete");
                Ok(())
            })
        })
        .with_closer_timeout(Duration::from_secs(10));

    runner.run().await;
}

async fn initialize_nats(config: &ServiceConfig) -> anyhow::Result<Arc<NatsClient>> {
    info!("initializing nats");
    let client = NatsClient::connect(&config.nats_url, config.startup_timeout()).await?;

    client
        .ensure_stream(&config.raw_telemetry_stream, "Raw device telemetry")
        .await?;
    client
        .ensure_stream(
            &config.metadata_request_stream,
            "Device metadata requests per telemetry batch",
        )
        .await?;
    client
        .ensure_stream(
            &config.metadata_response_stream,
            "Device metadata responses keyed by batch ID",
        )
        .await?;
    client
        .ensure_stream(
            &config.processed_events_stream,
            "Enriched telemetry with safety evaluation",
        )
        .await?;

    Ok(Arc::new(client))
}

async fn create_batch_cache(
    nats_client: &NatsClient,
    config: &ServiceConfig,
) -> anyhow::Result<Arc<dyn BatchCache>> {
    let store: Arc<dyn KeyValueStore> = match config.cache_backend {
        CacheBackend::NatsKv => Arc::new(
            nats_client
                .create_key_value_store(&config.batch_cache_bucket, config.batch_ttl())
                .await?,
        ),
        CacheBackend::InMemory => {
            warn!("using in-memory batch cache, pending batches do not survive restarts");
            Arc::new(InMemoryKeyValueStore::new())
        }
    };

    Ok(Arc::new(CorrelationCache::new(store)))
}
