use std::sync::Arc;

use anyhow::{Context, bail};
use tracing::{info, warn};

use raseed_events::{EventBus, EventHandler, InMemoryEventBus};
use raseed_extraction::{ExtractionAdapter, GeminiClient};
use raseed_infra::config::{BusBackend, StoreBackend, WorkerConfig};
use raseed_infra::event_bus::RedisStreamsEventBus;
use raseed_infra::pipelines::{QueryPipeline, ReceiptPipeline, StockPipeline, ThirdPartyPipeline};
use raseed_infra::record_store::{DocumentStore, InMemoryDocumentStore, PostgresDocumentStore};
use raseed_infra::workers::PipelineWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkerConfig::from_env();
    raseed_observability::init(config.log_format);
    for warning in &config.warnings {
        warn!("{warning}");
    }

    let store = document_store(&config).await?;
    let bus = event_bus(&config)?;
    let extraction = ExtractionAdapter::new(Arc::new(gemini_client(&config)?))
        .with_timeout(config.extraction_timeout);

    let handlers: Vec<Arc<dyn EventHandler>> = vec![
        Arc::new(ReceiptPipeline::new(store.clone(), extraction.clone())),
        Arc::new(QueryPipeline::new(store.clone(), extraction)),
        Arc::new(StockPipeline::new(store.clone(), bus.clone())),
        Arc::new(ThirdPartyPipeline::new(store)),
    ];
    let workers: Vec<_> = handlers
        .into_iter()
        .map(|handler| PipelineWorker::spawn(handler, bus.clone(), config.worker_options()))
        .collect();

    info!(workers = workers.len(), store = ?config.store, bus = ?config.bus, model = %config.gemini_model, "raseed worker running");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutdown requested; draining in-flight deliveries");

    for worker in workers {
        let name = worker.name();
        let stats = worker.shutdown().await;
        info!(worker = name, ?stats, "worker drained");
    }

    Ok(())
}

async fn document_store(config: &WorkerConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match config.store {
        StoreBackend::Memory => {
            warn!("using the in-memory document store; records are lost on exit");
            Ok(Arc::new(InMemoryDocumentStore::new()))
        }
        StoreBackend::Postgres => {
            let Some(url) = config.database_url.as_deref() else {
                bail!("DATABASE_URL must be set when RASEED_STORE=postgres");
            };
            let store = PostgresDocumentStore::connect(url)
                .await
                .context("failed to connect to postgres")?;
            Ok(Arc::new(store))
        }
    }
}

fn event_bus(config: &WorkerConfig) -> anyhow::Result<Arc<dyn EventBus>> {
    match config.bus {
        BusBackend::Memory => {
            warn!("using the in-memory event bus; only this process can publish to it");
            Ok(Arc::new(
                InMemoryEventBus::new().with_max_deliveries(config.max_deliveries),
            ))
        }
        BusBackend::Redis => {
            let Some(url) = config.redis_url.as_deref() else {
                bail!("REDIS_URL must be set when RASEED_BUS=redis");
            };
            let bus = RedisStreamsEventBus::new(url)?
                .with_consumer(config.redis_consumer.as_str())
                .with_max_deliveries(config.max_deliveries);
            bus.check_connection().context("failed to connect to redis")?;
            Ok(Arc::new(bus))
        }
    }
}

fn gemini_client(config: &WorkerConfig) -> anyhow::Result<GeminiClient> {
    let Some(api_key) = config.gemini_api_key.as_deref() else {
        bail!("GEMINI_API_KEY must be set");
    };

    let mut client = GeminiClient::new(api_key, config.gemini_model.as_str())?;
    if let Some(vision) = &config.gemini_vision_model {
        client = client.with_vision_model(vision.as_str());
    }
    if let Some(base_url) = &config.gemini_base_url {
        client = client.with_base_url(base_url.as_str());
    }
    Ok(client)
}
