use anyhow::{Context, Result};
use craftdeck_api::{create_app, Config};
use craftdeck_client::{GraphqlClient, SpaceliftClient};
use craftdeck_orchestrator::EnvironmentService;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = craftdeck_logging::init_subscriber();

    info!("Starting craftdeck-api service...");

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: bind_addr={}, endpoint={}, blueprint={}, label={}",
        config.bind_addr, config.spacelift_endpoint, config.blueprint_id, config.managed_label
    );
    if config.settle_delay_secs == 0 {
        warn!("Settle delay is 0s; provisioning stacks may be destroyed before their configuration stack is gone");
    }

    let graphql = GraphqlClient::new(
        config.spacelift_endpoint.clone(),
        config.api_key(),
        config.request_timeout(),
    )
    .context("Failed to build Spacelift client")?;
    let api = Arc::new(SpaceliftClient::new(graphql));
    let service = EnvironmentService::new(api, config.service_settings());

    let app = create_app(service);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}
