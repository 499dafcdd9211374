//! Upload stream state machine.
//!
//! ```text
//! AwaitingMetadata --metadata--> Receiving --data--> Receiving
//!                                Receiving --end---> Finalizing --> Succeeded | sync error
//! any state --transport/storage/hash error or protocol violation--> Failed (abort)
//! ```
//!
//! Every step runs in order inside one call: write, hash, sync, register,
//! respond. A digest is only produced after every byte it covers has been
//! written, so the registered digest always matches the file on disk.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};

use chunknode_protocol::{ChunkMetadata, UploadFrame, UploadResponse};
use chunknode_storage::{ChunkBackend, ChunkWriter, IntegrityHasher};

use crate::IngestError;
use crate::handoff::{Handoff, PersistedChunk};
use crate::source::FrameSource;

/// Runs upload streams against a chunk backend.
pub struct Ingestor<B: ChunkBackend> {
    backend: Arc<B>,
    handoff: Handoff,
    max_chunk_bytes: Option<u64>,
}

enum State<W> {
    AwaitingMetadata,
    Receiving(Receiving<W>),
}

struct Receiving<W> {
    meta: ChunkMetadata,
    writer: W,
    hasher: IntegrityHasher,
}

impl<B: ChunkBackend> Ingestor<B> {
    pub fn new(backend: Arc<B>, handoff: Handoff) -> Self {
        Self {
            backend,
            handoff,
            max_chunk_bytes: None,
        }
    }

    /// Aborts uploads whose chunk grows past `limit` bytes.
    pub fn with_max_chunk_size(mut self, limit: u64) -> Self {
        self.max_chunk_bytes = Some(limit);
        self
    }

    fn hasher(&self) -> IntegrityHasher {
        match self.max_chunk_bytes {
            Some(limit) => IntegrityHasher::with_limit(limit),
            None => IntegrityHasher::new(),
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Consumes one upload stream and produces its terminal response.
    ///
    /// Failures before the end of stream abort with an error and nothing
    /// is registered or dispatched. A failed sync after the end of stream
    /// is reported as an error response instead.
    pub async fn upload<S: FrameSource>(
        &self,
        source: &mut S,
    ) -> Result<UploadResponse, IngestError> {
        info!(peer = %source.peer(), "received storage request");
        let result = self.receive(source).await;
        if let Err(e) = &result {
            error!(peer = %source.peer(), "upload aborted: {e}");
        }
        result
    }

    async fn receive<S: FrameSource>(
        &self,
        source: &mut S,
    ) -> Result<UploadResponse, IngestError> {
        let mut state = State::AwaitingMetadata;
        let mut first_frame: Option<Instant> = None;

        loop {
            let frame = source.next_frame().await?;
            let started = *first_frame.get_or_insert_with(Instant::now);

            state = match (state, frame) {
                (State::AwaitingMetadata, Some(UploadFrame::Metadata(meta))) => {
                    let writer = self.backend.open_chunk(&meta).await?;
                    debug!(
                        file_id = %meta.file_id,
                        chunk = %meta.chunk_name,
                        "chunk opened"
                    );
                    State::Receiving(Receiving {
                        meta,
                        writer,
                        hasher: self.hasher(),
                    })
                }
                (State::AwaitingMetadata, Some(UploadFrame::Data(_))) => {
                    return Err(IngestError::ProtocolViolation(
                        "data frame received before metadata".into(),
                    ));
                }
                (State::AwaitingMetadata, None) => {
                    return Err(IngestError::ProtocolViolation(
                        "stream ended before metadata".into(),
                    ));
                }
                (State::Receiving(_), Some(UploadFrame::Metadata(_))) => {
                    return Err(IngestError::ProtocolViolation(
                        "metadata frame received twice".into(),
                    ));
                }
                (State::Receiving(mut r), Some(UploadFrame::Data(data))) => {
                    // Only bytes that reached the file may enter the digest.
                    r.writer.write_frame(&data.raw_bytes).await?;
                    r.hasher.update(&data.raw_bytes)?;
                    State::Receiving(r)
                }
                (State::Receiving(r), None) => {
                    return Ok(self.finalize(r, started).await);
                }
            };
        }
    }

    async fn finalize(&self, r: Receiving<B::Writer>, started: Instant) -> UploadResponse {
        let Receiving {
            meta,
            mut writer,
            hasher,
        } = r;

        if let Err(e) = writer.sync().await {
            error!(
                file_id = %meta.file_id,
                chunk = %meta.chunk_name,
                "failed to sync chunk file: {e}"
            );
            return UploadResponse::error(format!("failed to sync chunk file: {e}"));
        }

        let elapsed = started.elapsed();
        let size = hasher.len();
        let digest = hasher.finalize();
        let path = writer.path().to_path_buf();
        drop(writer);

        info!(
            file_id = %meta.file_id,
            chunk = %meta.chunk_name,
            bytes = size,
            digest = %digest,
            elapsed_ms = elapsed.as_millis() as u64,
            "chunk stored"
        );

        self.handoff
            .run(PersistedChunk {
                metadata: meta,
                path,
                digest,
                size,
            })
            .await;

        UploadResponse::ok(format!("Upload completed in {elapsed:?}"), elapsed)
    }
}
