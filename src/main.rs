use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use media_gen_rmcp::{
    api,
    config::AppConfig,
    jobs::{Buckets, Pipeline, spawn_worker},
    mcp_server::MediaServer,
    providers::{DraphClient, FalClient, HttpFetcher, OpenAiTranslator, RunwayClient},
    records::Records,
    service::MediaService,
    status::CacheStatusChannel,
    storage::FsObjectStore,
};

const STATUS_CAPACITY: u64 = 100_000;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("media_gen_rmcp=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    let records = Records::open(&config.records_dir())
        .await
        .with_context(|| format!("open records at {}", config.records_dir().display()))?;
    tokio::fs::create_dir_all(&config.storage.root)
        .await
        .with_context(|| format!("create object root {}", config.storage.root.display()))?;
    let store = FsObjectStore::new(config.storage.root.clone(), config.storage.urls.clone());

    let pipeline = Arc::new(Pipeline {
        records: Arc::new(records),
        store: Arc::new(store.clone()),
        status: Arc::new(CacheStatusChannel::new(config.status_ttl, STATUS_CAPACITY)),
        fetcher: Arc::new(HttpFetcher::new()),
        backgrounds: Arc::new(DraphClient::new(config.draph.clone())),
        image_video: Arc::new(RunwayClient::new(config.video_api.clone())),
        text_video: Arc::new(FalClient::new(config.fal.clone())),
        translator: Arc::new(OpenAiTranslator::new(config.openai.clone())),
        buckets: Buckets {
            media: config.storage.media_bucket.clone(),
            video: config.storage.video_bucket.clone(),
        },
        policy: config.pipeline,
    });
    let (queue, worker) = spawn_worker(
        pipeline.clone(),
        config.worker_concurrency,
        config.queue_capacity,
    );
    let service = Arc::new(MediaService::new(pipeline, queue));

    let mcp_path = config.mcp_path();
    let service_for_mcp = service.clone();
    let mcp = StreamableHttpService::new(
        move || Ok(MediaServer::new(service_for_mcp.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    );
    let router = api::router(service)
        .nest_service(&mcp_path, mcp)
        .nest_service("/objects", ServeDir::new(store.root()))
        .layer(TraceLayer::new_for_http());

    let tcp_listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("bind {}", config.bind_address))?;
    tracing::info!(
        address = %config.bind_address,
        mcp = %mcp_path,
        data_dir = %config.data_dir.display(),
        "media generation server started"
    );

    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // The worker drains once the last queue handle is gone.
    match tokio::time::timeout(SHUTDOWN_GRACE, worker).await {
        Ok(joined) => joined.context("job worker panicked")?,
        Err(_) => tracing::warn!("jobs still running at shutdown"),
    }
    Ok(())
}
