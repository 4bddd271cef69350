mod api;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transit_fleet_engine::{EngineConfig, FleetEngine};

#[derive(Parser)]
#[command(name = "transit-fleet-engine")]
#[command(about = "Live ETA and crowd levels for a transit fleet")]
struct Args {
    /// Port to run the HTTP server on
    #[arg(short, long, env = "SERVER_PORT", default_value = "8000")]
    port: u16,

    /// YAML engine configuration; built-in reference values when omitted
    #[arg(short, long, env = "FLEET_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting fleet state engine...");

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let timezone = config.predictor.tz()?;

    let engine = FleetEngine::from_config(&config).context("failed to build fleet engine")?;

    let state = api::server::AppState {
        engine: Arc::new(engine),
        timezone,
        default_vehicle_id: config.default_vehicle_id.clone(),
    };

    api::server::run_server(state, args.port).await
}
