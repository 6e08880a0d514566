//! Trade replication relay - entry point.
//!
//! Runs the engine with the bundled paper transport; a real deployment
//! embeds `Application` with its own dispatcher and gateway.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

/// Trade replication relay
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via RELAY_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    relay_telemetry::init_logging()?;

    info!("Starting relay v{}", env!("CARGO_PKG_VERSION"));

    let config = match args.config {
        Some(path) => relay_bot::AppConfig::from_file(&path)?,
        None => relay_bot::AppConfig::load()?,
    };
    info!(
        master = %config.master_account,
        receivers = config.receivers.len(),
        "Configuration loaded"
    );

    let dispatcher = Arc::new(relay_bot::PaperDispatcher::new());
    let gateway = Arc::new(relay_bot::PaperGateway::new(config.paper.balance));

    let app = relay_bot::Application::new(config, dispatcher, gateway)?;
    app.run().await?;

    Ok(())
}
