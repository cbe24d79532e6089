//! Churnlens service entry point

use anyhow::{Context, Result};
use churnlens_ai_service::{start_server, AppState, ServiceConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "churnlens-serve")]
#[command(about = "Serve churn predictions, explanations and retention actions")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the configuration
    #[arg(long)]
    bind: Option<String>,

    /// Artifact directory, overrides the configuration
    #[arg(long)]
    artifacts: Option<PathBuf>,

    /// Load artifacts on first request instead of at startup
    #[arg(long)]
    lazy: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    info!("Starting churnlens service v{}", env!("CARGO_PKG_VERSION"));

    let mut config = ServiceConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(artifacts) = cli.artifacts {
        config.artifacts_dir = artifacts;
    }
    if cli.lazy {
        config.preload = false;
    }
    info!(
        bind = %config.bind_addr,
        artifacts = %config.artifacts_dir.display(),
        preload = config.preload,
        "configuration resolved"
    );

    let state = AppState::new(config);
    if state.config.preload {
        state.store.artifacts().await.map_err(|e| {
            error!("Failed to preload artifacts: {}", e);
            e
        })?;
    }

    start_server(state).await
}

fn init_logging() {
    let env = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(env)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
