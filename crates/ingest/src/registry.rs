//! In-process chunk metadata registry.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::services::{MetadataService, ServiceFuture};

/// Maps `file_id -> chunk_name -> digest`.
///
/// Registering a chunk again replaces its digest, matching a re-upload
/// overwriting the chunk file.
#[derive(Default)]
pub struct MemoryRegistry {
    files: RwLock<HashMap<Uuid, BTreeMap<String, String>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered digest of one chunk.
    pub async fn digest_of(&self, file_id: Uuid, chunk_name: &str) -> Option<String> {
        let files = self.files.read().await;
        files.get(&file_id)?.get(chunk_name).cloned()
    }

    /// All `(chunk_name, digest)` pairs of a file, sorted by name.
    pub async fn chunks_of(&self, file_id: Uuid) -> Vec<(String, String)> {
        let files = self.files.read().await;
        files
            .get(&file_id)
            .map(|chunks| {
                chunks
                    .iter()
                    .map(|(name, digest)| (name.clone(), digest.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl MetadataService for MemoryRegistry {
    fn register_chunk<'a>(
        &'a self,
        file_id: Uuid,
        chunk_name: &'a str,
        digest: &'a str,
    ) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            let mut files = self.files.write().await;
            files
                .entry(file_id)
                .or_default()
                .insert(chunk_name.to_string(), digest.to_string());
            debug!(%file_id, chunk = chunk_name, "chunk registered");
            Ok(())
        })
    }
}
