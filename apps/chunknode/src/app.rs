//! Wires the chunk store, collaborators and upload server together.

use std::sync::Arc;

use chunknode_ingest::{
    DigestValidator, Handoff, IngestServer, Ingestor, MemoryRegistry, NodeConfig, PeerForwarder,
};
use chunknode_storage::ChunkStore;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Runs the node until Ctrl+C.
pub async fn run(config: NodeConfig) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let store = Arc::new(ChunkStore::new(config.storage_root.clone()));
    let registry = Arc::new(MemoryRegistry::new());

    // -- Handoff --
    let handoff = Handoff::spawn(
        registry.clone(),
        Arc::new(DigestValidator::new(Arc::clone(&store), registry.clone())),
        Arc::new(PeerForwarder::new(config.forward_peers.clone())),
        config.dispatch_queue_capacity,
        cancel.clone(),
    );

    // -- Upload server --
    let mut ingestor = Ingestor::new(store, handoff);
    if let Some(limit) = config.max_chunk_bytes {
        ingestor = ingestor.with_max_chunk_size(limit);
    }
    let server = IngestServer::new(config.listen_addr.clone(), ingestor, cancel.clone());
    let listener = server.bind().await?;
    let server_run = Arc::clone(&server);
    let serve = tokio::spawn(async move { server_run.serve(listener).await }.in_current_span());

    tokio::select! {
        _ = cancel.cancelled() => {
            tracing::info!("shutdown signal received");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, shutting down");
        }
    }

    server.shutdown();
    serve.await??;
    Ok(())
}
