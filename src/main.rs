//! ccus-gateway server entry point.
//!
//! Starts the registry actor and the Axum server with the subscriber
//! socket and health endpoints.

use std::time::Duration;

use tracing_subscriber::EnvFilter;

use ccus_gateway::app_state::AppState;
use ccus_gateway::config::GatewayConfig;
use ccus_gateway::domain::Registry;
use ccus_gateway::server;
use ccus_gateway::service::run_stats_reporter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing; LOG_FORMAT=json switches to structured output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Load configuration
    let config = GatewayConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, path = %config.ws_path, "starting ccus-gateway");

    // Build domain layer
    let registry = Registry::new().spawn(config.registry_queue_capacity);
    let state = AppState::new(registry, config.session.clone());

    if config.stats_interval_secs > 0 {
        tokio::spawn(run_stats_reporter(
            state.registry.clone(),
            state.connections.clone(),
            Duration::from_secs(config.stats_interval_secs),
            state.shutdown.clone(),
        ));
    }

    // Cancel every session on Ctrl-C
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
            return;
        }
        tracing::info!("shutdown requested");
        shutdown.cancel();
    });

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    server::serve(listener, state, &config.ws_path).await?;

    Ok(())
}
