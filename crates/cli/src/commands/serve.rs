//! `staybot serve`: start the HTTP / WebSocket server.

use anyhow::Context;
use staybot_agent::Runtime;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub async fn run(config_path: Option<&Path>, port_override: Option<u16>) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("staybot gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:  {} ({})", config.provider.kind.as_str(), config.provider.model_name());
    println!("   Hotel API: {}", config.hotel.base_url);

    let runtime = Runtime::start(config)
        .await
        .context("Startup failed")?;

    staybot_gateway::serve(Arc::new(runtime), shutdown_signal())
        .await
        .context("Gateway error")?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested");
    }
}
