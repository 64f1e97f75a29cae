//! linkgate binary entry point.
//!
//! Usage:
//! ```bash
//! linkgate --mock
//! linkgate --config linkgate.toml --mock
//! PORT=8080 PERSISTENT_DATA_PATH=/data linkgate --mock
//! linkgate --help
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use gate_client::MockTransport;
use gate_server::{Config, Gateway};
use gate_types::Jid;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// HTTP gateway around one authenticated messaging session.
#[derive(Parser, Debug)]
#[command(name = "linkgate")]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the in-process mock transport (for testing/demo)
    #[arg(long)]
    mock: bool,

    /// Phone number the mock pairs as
    #[arg(long, default_value = "15550000000")]
    mock_number: String,

    /// Seconds the mock waits before confirming a pairing challenge
    #[arg(long, default_value = "15")]
    mock_pair_after: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if !cli.mock {
        // No network transport is linked into this build
        bail!("no messaging transport available; run with --mock");
    }

    let me = Jid::from_destination(&cli.mock_number).context("Invalid --mock-number")?;
    let transport = MockTransport::with_autopilot(me, Duration::from_secs(cli.mock_pair_after));

    tracing::info!("linkgate v{} starting", env!("CARGO_PKG_VERSION"));
    Gateway::new(config, transport)
        .run(shutdown_signal())
        .await
        .context("Gateway stopped with an error")?;

    tracing::info!("linkgate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
