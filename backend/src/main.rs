use anyhow::Result;
use safe_ledger_backend::api::handlers::AppState;
use safe_ledger_backend::create_router;
use safe_ledger_backend::infrastructure::OracleClient;
use safe_ledger_backend::services::{HealthMonitor, LedgerService, MonitorConfig};
use safe_ledger_backend::BackendConfig;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread", worker_threads = 8)]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("Starting Safe Ledger Backend");

    let config = BackendConfig::from_env()?;

    info!("Configuration:");
    info!("  Liquidation ratio: {}%", config.liquidation_ratio);
    info!("  Default price: {}", config.default_price);
    info!("  Collateral tokens: {:?}", config.collateral_tokens);
    info!("  Oracle: {}", if config.enable_oracle { config.hermes_url.as_str() } else { "disabled" });
    info!("  Port: {}", config.port);

    let service = Arc::new(LedgerService::new(&config)?);
    info!("Ledger deployed at {}", service.ledger_address().await);

    let oracle_client = config.enable_oracle.then(|| {
        Arc::new(OracleClient::new(config.hermes_url.clone()).with_native_feed(&config.native_price_feed_id))
    });

    let monitor = Arc::new(HealthMonitor::new(
        Arc::clone(&service),
        oracle_client,
        MonitorConfig::from(&config),
    ));
    monitor.start().await?;
    info!("Health monitor started (background tasks)");

    let state = AppState {
        service,
        monitor: Arc::clone(&monitor),
    };

    // Create router with middleware
    let app = create_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start HTTP server
    let addr = format!("0.0.0.0:{}", config.port);
    info!("HTTP server starting on {}", addr);
    info!("WebSocket available at ws://{}/ws", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    monitor.stop().await;

    Ok(())
}
