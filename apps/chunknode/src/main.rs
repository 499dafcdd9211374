//! chunknode storage node entry point.

mod app;

use chunknode_ingest::NodeConfig;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting chunknode");

    let config = NodeConfig::load();
    tracing::info!(
        name = %config.node_name,
        storage = %config.storage_root.display(),
        peers = config.forward_peers.len(),
        "configuration loaded"
    );

    let span = tracing::info_span!("node", name = %config.node_name);
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config).instrument(span))?;

    tracing::info!("node shut down cleanly");
    Ok(())
}
