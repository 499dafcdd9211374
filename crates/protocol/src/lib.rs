//! Wire protocol types for chunk upload streams.
//!
//! An upload stream is one metadata frame, zero or more data frames, and an
//! end marker, answered by exactly one [`UploadResponse`]. See [`wire`] for
//! the binary encoding.

pub mod constants;
pub mod error;
pub mod types;
pub mod wire;

// Re-export primary types for convenience.
pub use constants::{CHUNK_EXTENSION, MAX_DATA_FRAME};
pub use error::ProtocolError;
pub use types::{ChunkData, ChunkMetadata, UploadFrame, UploadResponse, UploadStatus};
