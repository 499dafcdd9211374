//! Contracts of the collaborators the ingestion pipeline hands chunks to.
//!
//! Implementors own their retry and alerting policy; the pipeline only
//! logs what they return.

use std::future::Future;
use std::pin::Pin;

use uuid::Uuid;

use crate::handoff::PersistedChunk;

/// A boxed future returned by collaborator methods.
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ServiceError>> + Send + 'a>>;

/// Records chunk-to-file associations.
pub trait MetadataService: Send + Sync + 'static {
    /// Records that `chunk_name` of `file_id` is stored with `digest`.
    ///
    /// Awaited before the upload is acknowledged.
    fn register_chunk<'a>(
        &'a self,
        file_id: Uuid,
        chunk_name: &'a str,
        digest: &'a str,
    ) -> ServiceFuture<'a, ()>;
}

/// Independently re-verifies stored chunks of a file.
pub trait Validator: Send + Sync + 'static {
    fn validate(&self, file_id: Uuid) -> ServiceFuture<'_, ()>;
}

/// Replicates a persisted chunk to other nodes.
pub trait Forwarder: Send + Sync + 'static {
    fn forward(&self, chunk: PersistedChunk) -> ServiceFuture<'_, ()>;
}

/// Errors reported by collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("chunks of {file_id} failed validation: {}", chunks.join(", "))]
    Corrupt { file_id: Uuid, chunks: Vec<String> },

    #[error("forwarding failed for {failed} of {total} peers")]
    Forward { failed: usize, total: usize },

    #[error("{0}")]
    Failed(String),
}
