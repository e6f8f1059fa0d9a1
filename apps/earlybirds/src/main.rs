use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{HttpOrderService, ViewController};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod render;
mod repl;

use config::{load_settings, DEFAULT_CONFIG_PATH};

const DEFAULT_LOG_FILTER: &str = "earlybirds=info,client_core=info";

#[derive(Parser, Debug)]
#[command(name = "earlybirds", about = "Browse the menu and order from the EarlyBirds order service")]
struct Args {
    /// Order service base URL; overrides the config file and environment.
    #[arg(long)]
    api_base: Option<String>,
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(&args.config)?;
    if let Some(v) = args.api_base {
        settings.api_base_url = v;
    }
    if let Some(v) = args.timeout_secs {
        settings.request_timeout_secs = v;
    }

    let service = HttpOrderService::new(&settings.api_base_url, settings.request_timeout())
        .with_context(|| {
            format!(
                "failed to set up order service client for '{}'",
                settings.api_base_url
            )
        })?;
    info!(api_base = %service.base_url(), "starting earlybirds");

    let controller = ViewController::new(Arc::new(service));
    repl::run(controller).await
}
