//! Warden Gateway - Main entry point.

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warden_client::IdentityClient;
use warden_gateway::GatewayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = GatewayConfig::parse();

    tracing::info!("Starting Warden gateway...");
    tracing::info!("Identity service: {}", config.identity_addr);

    let client = IdentityClient::connect(config.client_config()).await?;
    let listener = TcpListener::bind(&config.bind).await?;

    warden_gateway::run(listener, client, shutdown_signal()).await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutting down...");
}
