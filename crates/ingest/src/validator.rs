//! Re-verifies stored chunks against their registered digests.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use chunknode_storage::{ChunkStore, calculate_file_checksum};

use crate::registry::MemoryRegistry;
use crate::services::{ServiceError, ServiceFuture, Validator};

/// Recomputes SHA-256 of every registered chunk of a file.
pub struct DigestValidator {
    store: Arc<ChunkStore>,
    registry: Arc<MemoryRegistry>,
}

impl DigestValidator {
    pub fn new(store: Arc<ChunkStore>, registry: Arc<MemoryRegistry>) -> Self {
        Self { store, registry }
    }

    async fn check(&self, file_id: Uuid) -> Result<(), ServiceError> {
        let chunks = self.registry.chunks_of(file_id).await;
        let mut corrupt = Vec::new();

        for (name, expected) in &chunks {
            let path = self.store.chunk_path(file_id, name);
            let actual = tokio::task::spawn_blocking(move || calculate_file_checksum(&path))
                .await
                .map_err(|e| ServiceError::Failed(format!("checksum task failed: {e}")))?;

            match actual {
                Ok(actual) if actual == *expected => {}
                Ok(actual) => {
                    warn!(%file_id, chunk = %name, %expected, %actual, "digest mismatch");
                    corrupt.push(name.clone());
                }
                Err(e) => {
                    warn!(%file_id, chunk = %name, "chunk unreadable: {e}");
                    corrupt.push(name.clone());
                }
            }
        }

        if !corrupt.is_empty() {
            return Err(ServiceError::Corrupt {
                file_id,
                chunks: corrupt,
            });
        }

        debug!(%file_id, chunks = chunks.len(), "chunks verified");
        Ok(())
    }
}

impl Validator for DigestValidator {
    fn validate(&self, file_id: Uuid) -> ServiceFuture<'_, ()> {
        Box::pin(self.check(file_id))
    }
}
