//! Binary wire format for upload streams.
//!
//! # Wire format
//!
//! ```text
//! UPLOAD STREAM (client -> node), repeated:
//!   [1 byte: tag]
//!   tag 0x01 METADATA: [2 bytes BE: len][len bytes: JSON ChunkMetadata]
//!   tag 0x02 DATA:     [4 bytes BE: len][len bytes: raw chunk bytes]
//!   tag 0x00 END:      no body
//!
//! RESPONSE (node -> client), exactly once:
//!   [4 bytes BE: len][len bytes: JSON UploadResponse]
//! ```
//!
//! A socket EOF before the END tag surfaces as an I/O error, never as a
//! clean end of stream.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::{MAX_DATA_FRAME, MAX_RESPONSE_SIZE, TAG_DATA, TAG_END, TAG_METADATA};
use crate::error::ProtocolError;
use crate::types::{ChunkData, ChunkMetadata, UploadFrame, UploadResponse};

/// Writes a metadata frame.
pub async fn write_metadata<W: AsyncWrite + Unpin>(
    writer: &mut W,
    meta: &ChunkMetadata,
) -> Result<(), ProtocolError> {
    let json = serde_json::to_vec(meta)?;
    let len = json.len();
    if len > u16::MAX as usize {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            max: u16::MAX as usize,
        });
    }

    writer.write_u8(TAG_METADATA).await?;
    writer.write_u16(len as u16).await?;
    writer.write_all(&json).await?;
    Ok(())
}

/// Writes a data frame.
pub async fn write_data<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    if data.len() > MAX_DATA_FRAME {
        return Err(ProtocolError::FrameTooLarge {
            size: data.len(),
            max: MAX_DATA_FRAME,
        });
    }

    writer.write_u8(TAG_DATA).await?;
    writer.write_u32(data.len() as u32).await?;
    writer.write_all(data).await?;
    Ok(())
}

/// Writes the end-of-stream marker and flushes.
pub async fn write_end_marker<W: AsyncWrite + Unpin>(
    writer: &mut W,
) -> Result<(), ProtocolError> {
    writer.write_u8(TAG_END).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the next frame from the stream.
///
/// Returns `None` when the END marker is encountered.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<UploadFrame>, ProtocolError> {
    let tag = reader.read_u8().await?;
    match tag {
        TAG_END => Ok(None),
        TAG_METADATA => {
            let len = reader.read_u16().await? as usize;
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf).await?;
            let meta: ChunkMetadata = serde_json::from_slice(&buf)
                .map_err(|e| ProtocolError::InvalidMetadata(e.to_string()))?;
            Ok(Some(UploadFrame::Metadata(meta)))
        }
        TAG_DATA => {
            let len = reader.read_u32().await? as usize;
            if len > MAX_DATA_FRAME {
                return Err(ProtocolError::FrameTooLarge {
                    size: len,
                    max: MAX_DATA_FRAME,
                });
            }
            let mut raw_bytes = vec![0u8; len];
            reader.read_exact(&mut raw_bytes).await?;
            Ok(Some(UploadFrame::Data(ChunkData { raw_bytes })))
        }
        other => Err(ProtocolError::UnknownTag(other)),
    }
}

/// Writes the terminal response and flushes.
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &UploadResponse,
) -> Result<(), ProtocolError> {
    let json = serde_json::to_vec(response)?;
    writer.write_u32(json.len() as u32).await?;
    writer.write_all(&json).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the terminal response.
pub async fn read_response<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<UploadResponse, ProtocolError> {
    let len = reader.read_u32().await? as usize;
    if len > MAX_RESPONSE_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            max: MAX_RESPONSE_SIZE,
        });
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(serde_json::from_slice(&buf)?)
}
