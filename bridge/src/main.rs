// Kaspa block template bridge
//
// kaspad getBlockTemplate -> in-memory cache -> Redis PUBLISH, on a fixed interval.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use kaspa_bridge::app;
use kaspa_bridge::bus::{BusError, MessageBus, RedisBus};
use kaspa_bridge::config;

#[derive(Parser, Debug)]
#[command(name = "kaspa-bridge", version, about = "Relay kaspad block templates to a Redis channel")]
struct Args {
    /// Path to the JSON config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("SIGTERM, shutting down"),
                    _ = tokio::signal::ctrl_c() => tracing::info!("SIGINT, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to register SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("SIGINT, shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Ctrl+C, shutting down");
    }
}

async fn run(args: Args) -> Result<()> {
    let bridge = app::bootstrap(&args.config, config::private_key_from_env(), |url| async move {
        let bus = RedisBus::connect(&url).await?;
        Ok::<_, BusError>(Arc::new(bus) as Arc<dyn MessageBus>)
    })
    .await
    .with_context(|| format!("startup failed (config {})", args.config.display()))?;

    tracing::info!("Bridge started; relaying templates to channel {}", bridge.settings.redis_channel);
    let tasks = bridge.spawn();

    shutdown_signal().await;
    tasks.shutdown().await;

    tracing::info!("Bridge shut down cleanly");
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .init();

    if let Err(e) = run(Args::parse()).await {
        tracing::error!("fatal: {:#}", e);
        std::process::exit(1);
    }
}
