//! Upload server.
//!
//! Listens on a TCP port and runs one ingestion per connection. A
//! finished upload gets its response followed by a write shutdown; an
//! aborted one is simply dropped, so the client sees the stream break.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use chunknode_protocol::ProtocolError;
use chunknode_protocol::wire::write_response;
use chunknode_storage::ChunkBackend;

use crate::TCP_BUFFER_SIZE;
use crate::ingest::Ingestor;
use crate::source::StreamFrameSource;

/// Errors produced by the upload server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to send response: {0}")]
    Respond(#[from] ProtocolError),
}

/// Accepts upload connections until shut down.
pub struct IngestServer<B: ChunkBackend> {
    listen_addr: String,
    ingestor: Arc<Ingestor<B>>,
    cancel: CancellationToken,
}

impl<B: ChunkBackend> IngestServer<B> {
    pub fn new(
        listen_addr: impl Into<String>,
        ingestor: Ingestor<B>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            listen_addr: listen_addr.into(),
            ingestor: Arc::new(ingestor),
            cancel,
        })
    }

    /// Binds the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let listener = TcpListener::bind(self.listen_addr.as_str()).await?;
        tracing::info!("ingest server listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Binds and serves until [`shutdown`](Self::shutdown).
    pub async fn run(self: &Arc<Self>) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serves connections from an already bound listener.
    pub async fn serve(self: &Arc<Self>, listener: TcpListener) -> Result<(), ServerError> {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("ingest server shutting down");
                    break Ok(());
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let server = Arc::clone(self);
                            tokio::spawn(
                                async move {
                                    if let Err(e) =
                                        server.handle_connection(stream, peer_addr).await
                                    {
                                        tracing::error!(%peer_addr, "connection error: {e}");
                                    }
                                }
                                .in_current_span(),
                            );
                        }
                        Err(e) => {
                            tracing::error!("accept error: {e}");
                        }
                    }
                }
            }
        }
    }

    /// Stops accepting connections. In-flight uploads run to completion.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn handle_connection(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<(), ServerError> {
        let (reader, mut writer) = stream.into_split();
        let reader = BufReader::with_capacity(TCP_BUFFER_SIZE, reader);
        let mut source = StreamFrameSource::new(reader, peer_addr);

        // The ingestor already logged why; dropping the socket is the
        // only signal an aborted upload gets.
        let Ok(response) = self.ingestor.upload(&mut source).await else {
            return Ok(());
        };

        write_response(&mut writer, &response).await?;
        writer.shutdown().await?;
        Ok(())
    }
}
