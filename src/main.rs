// Settlement engine - Main Entry Point

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use settlement_engine::{build_router, AppState, EngineConfig, SharedState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("═══════════════════════════════════════════════");
    info!("     🎲 Prediction Market Settlement Engine");
    info!("═══════════════════════════════════════════════");

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    config.log_summary();

    let state: SharedState = match AppState::new(config.clone()) {
        Ok(state) => state.shared(),
        Err(e) => {
            error!("❌ Failed to initialize engine: {}", e);
            std::process::exit(1);
        }
    };

    // Clone state for shutdown handler before moving into router
    let shutdown_state = state.clone();
    let app = build_router(state);

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("❌ Failed to bind {}: {}", config.bind_addr, e);
            std::process::exit(1);
        }
    };

    info!("🚀 Server running on http://{}", config.bind_addr);
    info!("📋 Endpoints:");
    info!("   POST /rpc/call   - Apply a command (atomic)");
    info!("   POST /rpc/query  - Read-only query");
    info!("   GET  /events     - Committed event log (?from=&limit=)");
    info!("   GET  /health     - Health check");

    // Spawn shutdown handler
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("❌ Failed to install CTRL+C handler: {}", e);
            return;
        }

        info!("🛑 Shutdown signal received, saving state...");
        match shutdown_state.lock() {
            Ok(app_state) => {
                if let Err(e) = app_state.save_to_disk() {
                    error!("❌ Failed to save state: {}", e);
                }
            }
            Err(_) => error!("❌ State lock poisoned, snapshot skipped"),
        }

        info!("👋 Goodbye!");
        std::process::exit(0);
    });

    if let Err(e) = axum::serve(listener, app).await {
        error!("❌ Server error: {}", e);
    }
}
