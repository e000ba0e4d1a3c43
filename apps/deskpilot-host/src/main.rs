//! DeskPilot host entry point.
//!
//! Wires the module registry to an in-process transport, registers the
//! built-in modules and runs until interrupted.

mod config;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use app_service::AppModule;
use modhub::registry::ModuleRegistry;
use modhub::transport::{LoopbackTransport, Transport};
use storage_service::StorageModule;

use crate::config::HostConfig;
use crate::store::JsonFileBackend;

#[derive(Debug, Parser)]
#[command(name = "deskpilot-host", version, about = "DeskPilot automation host")]
struct Args {
    /// Path to the host configuration file.
    #[arg(long, default_value = "deskpilot.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = HostConfig::load(&args.config)?;

    // RUST_LOG wins over the configured filter.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let backend = Arc::new(
        JsonFileBackend::open(&config.settings_file)
            .await
            .with_context(|| {
                format!("opening settings store {}", config.settings_file.display())
            })?,
    );

    let transport = LoopbackTransport::new();
    let registry = ModuleRegistry::new(Arc::new(transport.clone()) as Arc<dyn Transport>);
    registry.use_module(StorageModule::new(backend))?;
    registry.use_module(AppModule::new())?;
    registry.setup().await.context("module setup failed")?;

    info!("host is running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;

    info!("shutting down");
    registry.dispose().await;
    Ok(())
}
