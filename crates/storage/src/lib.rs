//! Chunk persistence for a storage node.
//!
//! Chunks live at `<root>/<file_id>/<chunk_name>.chunk`. The per-file
//! directory is the only state shared between concurrent uploads, so its
//! creation is serialized per `file_id`; each chunk file is owned by the
//! single upload writing it.

mod hasher;
mod locks;
mod store;
mod validation;

pub use hasher::{IntegrityHasher, calculate_file_checksum, checksum_bytes};
pub use locks::{KeyedGuard, KeyedLocks};
pub use store::{ChunkBackend, ChunkFile, ChunkStore, ChunkWriter, StoreFuture};
pub use validation::validate_chunk_name;

/// Errors produced by the storage crate.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid chunk name: {0}")]
    InvalidName(String),
}

/// Errors produced while accumulating a digest.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("digest input exceeds {max} bytes")]
    LengthOverflow { max: u64 },
}
