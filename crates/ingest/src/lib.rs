//! Chunk ingestion for a storage node.
//!
//! A client streams one chunk per connection: a metadata frame, data
//! frames, and an end marker. The [`Ingestor`] writes and hashes every
//! frame, syncs the file, registers the digest, and hands the chunk to
//! the validation and forwarding queues before answering with a single
//! [`UploadResponse`](chunknode_protocol::UploadResponse).

pub mod client;
pub mod config;
pub mod forwarder;
pub mod handoff;
pub mod ingest;
pub mod registry;
pub mod server;
pub mod services;
pub mod source;
pub mod validator;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ClientError, UploadClient};
pub use config::{ConfigError, NodeConfig};
pub use forwarder::PeerForwarder;
pub use handoff::{Handoff, PersistedChunk};
pub use ingest::Ingestor;
pub use registry::MemoryRegistry;
pub use server::{IngestServer, ServerError};
pub use services::{Forwarder, MetadataService, ServiceError, ServiceFuture, Validator};
pub use source::{FrameFuture, FrameSource, StreamFrameSource};
pub use validator::DigestValidator;

use std::time::Duration;

/// TCP read/write buffer size (256 KB).
pub const TCP_BUFFER_SIZE: usize = 256 * 1024;

/// Timeout for establishing an outbound upload connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for a node's response once the end marker is sent.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(120);

/// Default capacity of the validation and forwarding queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Errors that abort an upload. The client sees the connection close
/// without a response.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("transport error: {0}")]
    Transport(#[from] chunknode_protocol::ProtocolError),

    #[error("storage error: {0}")]
    Storage(#[from] chunknode_storage::StorageError),

    #[error("hash error: {0}")]
    Hash(#[from] chunknode_storage::HashError),
}
