use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies which file a chunk belongs to and the chunk's name within it.
///
/// Sent exactly once, as the first frame of an upload stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub file_id: Uuid,
    pub chunk_name: String,
    /// Set on uploads sent by another node's forwarder. Replicas are
    /// stored and registered but never forwarded again.
    #[serde(default, skip_serializing_if = "is_false")]
    pub replica: bool,
}

fn is_false(v: &bool) -> bool {
    !*v
}

impl ChunkMetadata {
    pub fn new(file_id: Uuid, chunk_name: impl Into<String>) -> Self {
        Self {
            file_id,
            chunk_name: chunk_name.into(),
            replica: false,
        }
    }

    /// The same chunk, marked as a replica.
    pub fn as_replica(&self) -> Self {
        Self {
            replica: true,
            ..self.clone()
        }
    }
}

/// An ordered slice of a chunk's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkData {
    pub raw_bytes: Vec<u8>,
}

/// A single frame of an upload stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadFrame {
    Metadata(ChunkMetadata),
    Data(ChunkData),
}

impl UploadFrame {
    /// Convenience constructor for a data frame.
    pub fn data(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Data(ChunkData {
            raw_bytes: bytes.into(),
        })
    }

    /// Convenience constructor for a metadata frame.
    pub fn metadata(file_id: Uuid, chunk_name: impl Into<String>) -> Self {
        Self::Metadata(ChunkMetadata::new(file_id, chunk_name))
    }
}

/// Terminal status of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Ok,
    Error,
}

/// The single response returned for an upload stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub status: UploadStatus,
    pub message: String,
    /// Only present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

impl UploadResponse {
    /// Builds a successful response carrying the elapsed ingestion time.
    pub fn ok(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            status: UploadStatus::Ok,
            message: message.into(),
            elapsed_ms: Some(elapsed.as_millis().min(u64::MAX as u128) as u64),
        }
    }

    /// Builds an error response. Elapsed time is never reported on failure.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: UploadStatus::Error,
            message: message.into(),
            elapsed_ms: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == UploadStatus::Ok
    }
}
