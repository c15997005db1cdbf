//! Entry point for the Algonius wallet native host.
//!
//! The browser launches this binary per its native-messaging
//! manifest; stdin/stdout carry the extension pipe while the
//! dual-transport server listens for agents on loopback.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use host_runtime::{HostConfig, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    let config = HostConfig::load()?;

    // LOG_LEVEL feeds the default filter; RUST_LOG still wins when
    // set, which keeps ad-hoc debugging painless.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    // Stdout belongs to the native-messaging pipe; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = host_types::PROTOCOL_VERSION,
        "Starting Algonius wallet host"
    );

    Orchestrator::new(config).run().await?;

    // A graceful shutdown exits zero.
    Ok(())
}
