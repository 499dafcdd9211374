//! Error types for the upload wire protocol.

/// Errors produced while encoding or decoding upload frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown frame tag: {0:#04x}")]
    UnknownTag(u8),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("invalid metadata frame: {0}")]
    InvalidMetadata(String),
}
