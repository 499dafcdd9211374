//! Replicates persisted chunks to peer nodes.

use tracing::{info, warn};

use crate::client::UploadClient;
use crate::handoff::PersistedChunk;
use crate::services::{Forwarder, ServiceError, ServiceFuture};

/// Replays each persisted chunk to every configured peer.
///
/// Peers are tried in order; one failing peer does not stop the others.
/// Chunks are sent as replicas, which the receiving node does not forward.
pub struct PeerForwarder {
    peers: Vec<String>,
}

impl PeerForwarder {
    pub fn new(peers: Vec<String>) -> Self {
        Self { peers }
    }

    async fn replicate(&self, chunk: PersistedChunk) -> Result<(), ServiceError> {
        let meta = chunk.metadata.as_replica();
        let mut failed = 0;

        for peer in &self.peers {
            match UploadClient::upload_file(peer.as_str(), &meta, &chunk.path).await {
                Ok(resp) if resp.is_ok() => {
                    info!(
                        %peer,
                        file_id = %meta.file_id,
                        chunk = %meta.chunk_name,
                        "chunk replicated"
                    );
                }
                Ok(resp) => {
                    warn!(
                        %peer,
                        chunk = %meta.chunk_name,
                        "peer rejected chunk: {}",
                        resp.message
                    );
                    failed += 1;
                }
                Err(e) => {
                    warn!(%peer, chunk = %meta.chunk_name, "replication failed: {e}");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(ServiceError::Forward {
                failed,
                total: self.peers.len(),
            });
        }
        Ok(())
    }
}

impl Forwarder for PeerForwarder {
    fn forward(&self, chunk: PersistedChunk) -> ServiceFuture<'_, ()> {
        Box::pin(self.replicate(chunk))
    }
}
