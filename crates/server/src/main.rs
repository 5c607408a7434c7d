// Main entry point for the replica hub

mod config;
mod error;
mod hub;
mod replica;
mod server;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting replica hub...");

    let config = config::HubConfig::from_env()?;

    let state = hub::HubState::new();
    for name in &config.replicas {
        state.create_replica(name.clone()).await?;
    }

    server::create_server(state, config.bind_addr).await?;

    Ok(())
}
