//! Upload client.
//!
//! Opens one connection per chunk, streams the metadata frame, the data
//! frames and the end marker, then waits for the node's response.

use std::path::Path;

use tokio::io::{AsyncReadExt, BufWriter};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use chunknode_protocol::wire::{read_response, write_data, write_end_marker, write_metadata};
use chunknode_protocol::{ChunkMetadata, MAX_DATA_FRAME, ProtocolError, UploadResponse};

use crate::{CONNECT_TIMEOUT, RESPONSE_TIMEOUT, TCP_BUFFER_SIZE};

/// Errors produced by the upload client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("connection timed out")]
    Timeout,
}

/// Streams chunks to a storage node.
pub struct UploadClient;

impl UploadClient {
    /// Uploads a chunk held in memory, one data frame per slice.
    pub async fn upload_bytes<A: ToSocketAddrs>(
        addr: A,
        meta: &ChunkMetadata,
        slices: &[&[u8]],
    ) -> Result<UploadResponse, ClientError> {
        let stream = connect(addr).await?;
        let (mut reader, writer) = stream.into_split();
        let mut writer = BufWriter::with_capacity(TCP_BUFFER_SIZE, writer);

        write_metadata(&mut writer, meta).await?;
        for slice in slices {
            write_data(&mut writer, slice).await?;
        }
        write_end_marker(&mut writer).await?;

        await_response(&mut reader).await
    }

    /// Uploads a chunk file from disk in [`MAX_DATA_FRAME`] slices.
    pub async fn upload_file<A: ToSocketAddrs>(
        addr: A,
        meta: &ChunkMetadata,
        path: &Path,
    ) -> Result<UploadResponse, ClientError> {
        let mut file = tokio::fs::File::open(path).await?;
        let stream = connect(addr).await?;
        let (mut reader, writer) = stream.into_split();
        let mut writer = BufWriter::with_capacity(TCP_BUFFER_SIZE, writer);

        write_metadata(&mut writer, meta).await?;

        let mut buf = vec![0u8; MAX_DATA_FRAME];
        let mut total: u64 = 0;
        loop {
            let n = read_full(&mut file, &mut buf).await?;
            if n == 0 {
                break;
            }
            write_data(&mut writer, &buf[..n]).await?;
            total += n as u64;
        }
        write_end_marker(&mut writer).await?;

        debug!(
            path = %path.display(),
            bytes = total,
            "chunk file sent"
        );

        await_response(&mut reader).await
    }
}

async fn connect<A: ToSocketAddrs>(addr: A) -> Result<TcpStream, ClientError> {
    match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(ClientError::Timeout),
    }
}

async fn await_response<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<UploadResponse, ClientError> {
    match tokio::time::timeout(RESPONSE_TIMEOUT, read_response(reader)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ClientError::Timeout),
    }
}

/// Fills `buf` unless the file ends first. Returns the bytes read.
async fn read_full(file: &mut tokio::fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
