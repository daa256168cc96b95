//! nightwatchd: wires the pipeline together and runs it.
//!
//! Configuration comes from the environment (plus an optional `.env`),
//! cameras from a JSON file, persistence from SQLite. Camera state
//! transitions arrive as JSON lines on stdin — the controller/RTSP
//! transport itself is an external concern; anything that can emit state
//! snapshots can drive the daemon.

mod ingest;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nightwatch_core::config::Config;
use nightwatch_core::model::Camera;
use nightwatch_entities::store::EntityStore;
use nightwatch_pipeline::costcap::CostTracker;
use nightwatch_pipeline::sqlite::SqliteStore;
use nightwatch_pipeline::thumbs::ThumbnailStore;
use nightwatch_pipeline::{EventHandler, EventProcessor, PipelineCore, PipelineSettings};
use nightwatch_vision::build_provider_chain;

/// How long the processor may drain queued events on shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

const DATA_DIR: &str = "data";

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(run())
}

fn load_cameras() -> anyhow::Result<Vec<Camera>> {
    let path = std::env::var("CAMERAS_FILE").unwrap_or_else(|_| "cameras.json".to_string());
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read cameras file {path}"))?;
    let cameras: Vec<Camera> =
        serde_json::from_str(&raw).with_context(|| format!("failed to parse {path}"))?;
    Ok(cameras)
}

fn database_path(database_url: &str) -> &str {
    database_url.strip_prefix("sqlite://").unwrap_or(database_url)
}

async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().context("configuration error")?;
    let cameras = load_cameras()?;
    info!(cameras = cameras.len(), workers = config.event_worker_count, "starting nightwatchd");

    let store = SqliteStore::open(database_path(&config.database_url))
        .await
        .context("failed to open database")?;

    let providers = build_provider_chain(&config.ai_provider_order, &config.provider_keys);
    if providers.is_empty() {
        warn!("no AI provider keys configured, every event will store as unavailable");
    }

    let mut core = PipelineCore::in_memory(
        cameras,
        providers,
        Arc::new(store.clone()) as Arc<dyn EntityStore>,
        PathBuf::from(DATA_DIR),
        PipelineSettings::from_config(&config),
    );
    core.events = Arc::new(store.clone());
    core.usage = Arc::new(store.clone());
    core.embeddings = Arc::new(store);
    core.costs = CostTracker::new(config.daily_cost_cap_usd);
    if let Ok(api_base) = std::env::var("API_BASE_URL") {
        core.thumbs = ThumbnailStore::new(DATA_DIR).with_api_base(api_base);
    }
    let core = Arc::new(core);

    let bridge = core.bridge.clone();
    tokio::spawn(async move { bridge.run().await });

    let processor = Arc::new(EventProcessor::new(
        core,
        config.event_queue_capacity as usize,
    ));
    processor.start(config.event_worker_count);

    let handler = Arc::new(EventHandler::new(processor.clone()));
    let ingest_task = tokio::spawn(ingest::read_stdin(handler));

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("shutdown signal received, draining");
    ingest_task.abort();
    processor.stop(SHUTDOWN_TIMEOUT).await;
    info!("nightwatchd stopped");
    Ok(())
}
