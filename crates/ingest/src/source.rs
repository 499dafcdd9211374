//! Inbound frame sources.

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;

use tokio::io::AsyncRead;

use chunknode_protocol::wire::read_frame;
use chunknode_protocol::{ProtocolError, UploadFrame};

/// A boxed future yielding the next frame, `None` on clean end of stream.
pub type FrameFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<UploadFrame>, ProtocolError>> + Send + 'a>>;

/// Delivers the frames of one upload stream in arrival order.
pub trait FrameSource: Send {
    /// Receives the next frame.
    ///
    /// `Ok(None)` is a clean end of stream; any peer abort is an error.
    fn next_frame(&mut self) -> FrameFuture<'_>;

    /// Network identity of the sender, for logging.
    fn peer(&self) -> &str;
}

/// Decodes frames from a byte stream using the binary wire format.
pub struct StreamFrameSource<R> {
    reader: R,
    peer: String,
}

impl<R: AsyncRead + Unpin + Send> StreamFrameSource<R> {
    pub fn new(reader: R, peer: impl Display) -> Self {
        Self {
            reader,
            peer: peer.to_string(),
        }
    }
}

impl<R: AsyncRead + Unpin + Send> FrameSource for StreamFrameSource<R> {
    fn next_frame(&mut self) -> FrameFuture<'_> {
        Box::pin(read_frame(&mut self.reader))
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use chunknode_protocol::wire::{write_data, write_end_marker, write_metadata};
    use chunknode_protocol::ChunkMetadata;

    #[tokio::test]
    async fn decodes_frames_then_end() {
        let meta = ChunkMetadata::new(Uuid::new_v4(), "c1");
        let mut buf = Vec::new();
        write_metadata(&mut buf, &meta).await.unwrap();
        write_data(&mut buf, b"xyz").await.unwrap();
        write_end_marker(&mut buf).await.unwrap();

        let mut source = StreamFrameSource::new(&buf[..], "127.0.0.1:9000");
        assert_eq!(source.peer(), "127.0.0.1:9000");
        assert_eq!(
            source.next_frame().await.unwrap(),
            Some(UploadFrame::Metadata(meta))
        );
        assert_eq!(
            source.next_frame().await.unwrap(),
            Some(UploadFrame::data("xyz"))
        );
        assert_eq!(source.next_frame().await.unwrap(), None);
    }
}
