//! Camwatch - Camera Uptime Monitor
//!
//! Main entry point for the monitoring service.

use camwatch::{
    alert_gateway::HttpAlertGateway,
    event_recorder::{EventLogStore, EventRecorder},
    orchestration::{FileInventory, OrchestrationLoop},
    result_cache::ResultCache,
    state::{AppConfig, AppState},
    verification_engine::{probe::HttpProber, VerificationEngine},
    web_api,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "camwatch=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Camwatch v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        inventory_path = %config.inventory_path,
        alert_url = %config.alert_url,
        cycle_interval_secs = config.cycle_interval.as_secs(),
        camera_workers = config.camera_workers,
        property_workers = config.property_workers,
        "Configuration loaded"
    );

    // Initialize components
    let prober = Arc::new(HttpProber::new(config.probe_timeout, config.http_pool_size));
    let alerts = Arc::new(HttpAlertGateway::new(
        config.alert_url.clone(),
        config.alert_username.clone(),
        config.alert_password.clone(),
    ));
    let events = Arc::new(EventRecorder::new());
    let event_log = Arc::new(EventLogStore::new(config.event_log_capacity));

    let engine = Arc::new(VerificationEngine::new(
        ResultCache::new(config.cache_config()),
        prober,
        alerts,
        events.clone(),
        config.engine_config(),
    ));

    let inventory = Arc::new(FileInventory::new(config.inventory_path.clone()));
    let orchestrator = OrchestrationLoop::new(
        engine.clone(),
        inventory,
        events,
        event_log.clone(),
        config.cycle_config(),
    );

    // Start verification loop
    tokio::spawn(async move {
        orchestrator.run().await;
    });
    tracing::info!("OrchestrationLoop started - verification cycles active");

    let state = AppState {
        config: config.clone(),
        engine,
        event_log,
    };

    let app = web_api::create_router(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
