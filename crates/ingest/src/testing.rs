//! Test doubles shared by the crate's unit tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use chunknode_protocol::{ChunkMetadata, ProtocolError, UploadFrame};
use chunknode_storage::{
    ChunkBackend, ChunkFile, ChunkStore, ChunkWriter, StorageError, StoreFuture, checksum_bytes,
};

use crate::handoff::PersistedChunk;
use crate::services::{Forwarder, MetadataService, ServiceError, ServiceFuture, Validator};
use crate::source::{FrameFuture, FrameSource};

// ---------------------------------------------------------------------------
// Frame sources
// ---------------------------------------------------------------------------

/// Replays a fixed list of receive results.
pub struct ScriptedSource {
    script: VecDeque<Result<Option<UploadFrame>, ProtocolError>>,
}

impl ScriptedSource {
    /// Frames followed by a clean end of stream.
    pub fn completed(frames: Vec<UploadFrame>) -> Self {
        let mut script: VecDeque<_> = frames.into_iter().map(|f| Ok(Some(f))).collect();
        script.push_back(Ok(None));
        Self { script }
    }

    /// Frames followed by a peer abort.
    pub fn aborted(frames: Vec<UploadFrame>) -> Self {
        let mut script: VecDeque<_> = frames.into_iter().map(|f| Ok(Some(f))).collect();
        script.push_back(Err(ProtocolError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "peer reset",
        ))));
        Self { script }
    }

    /// Receive results not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> FrameFuture<'_> {
        let next = self.script.pop_front().unwrap_or_else(|| {
            Err(ProtocolError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "script exhausted",
            )))
        });
        Box::pin(async move { next })
    }

    fn peer(&self) -> &str {
        "test-peer"
    }
}

/// Metadata frame followed by one data frame per slice.
pub fn upload_frames(meta: &ChunkMetadata, slices: &[&[u8]]) -> Vec<UploadFrame> {
    let mut frames = vec![UploadFrame::Metadata(meta.clone())];
    frames.extend(slices.iter().map(|s| UploadFrame::data(s.to_vec())));
    frames
}

// ---------------------------------------------------------------------------
// Fault-injecting backend
// ---------------------------------------------------------------------------

/// Wraps a [`ChunkStore`] and fails selected operations.
pub struct FaultyBackend {
    pub store: ChunkStore,
    /// Zero-based index of the data frame whose write fails.
    pub fail_write_at: Option<usize>,
    pub fail_sync: bool,
}

impl FaultyBackend {
    pub fn new(root: &Path) -> Self {
        Self {
            store: ChunkStore::new(root),
            fail_write_at: None,
            fail_sync: false,
        }
    }
}

pub struct FaultyWriter {
    inner: ChunkFile,
    writes: usize,
    fail_write_at: Option<usize>,
    fail_sync: bool,
}

impl ChunkBackend for FaultyBackend {
    type Writer = FaultyWriter;

    fn open_chunk<'a>(&'a self, meta: &'a ChunkMetadata) -> StoreFuture<'a, FaultyWriter> {
        Box::pin(async move {
            let inner = self.store.open_chunk(meta).await?;
            Ok(FaultyWriter {
                inner,
                writes: 0,
                fail_write_at: self.fail_write_at,
                fail_sync: self.fail_sync,
            })
        })
    }
}

impl ChunkWriter for FaultyWriter {
    fn write_frame<'a>(&'a mut self, data: &'a [u8]) -> StoreFuture<'a, ()> {
        let index = self.writes;
        self.writes += 1;
        if self.fail_write_at == Some(index) {
            return Box::pin(async {
                Err(StorageError::Io(std::io::Error::other("no space left on device")))
            });
        }
        self.inner.write_frame(data)
    }

    fn sync(&mut self) -> StoreFuture<'_, ()> {
        if self.fail_sync {
            return Box::pin(async { Err(StorageError::Io(std::io::Error::other("fsync failed"))) });
        }
        self.inner.sync()
    }

    fn path(&self) -> &Path {
        self.inner.path()
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Records every registration; optionally fails them all.
#[derive(Default)]
pub struct RecordingMetadata {
    calls: Mutex<Vec<(Uuid, String, String)>>,
    fail: bool,
}

impl RecordingMetadata {
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub async fn calls(&self) -> Vec<(Uuid, String, String)> {
        self.calls.lock().await.clone()
    }
}

impl MetadataService for RecordingMetadata {
    fn register_chunk<'a>(
        &'a self,
        file_id: Uuid,
        chunk_name: &'a str,
        digest: &'a str,
    ) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            self.calls
                .lock()
                .await
                .push((file_id, chunk_name.to_string(), digest.to_string()));
            if self.fail {
                return Err(ServiceError::Failed("metadata service unavailable".into()));
            }
            Ok(())
        })
    }
}

/// Reports every validated file id on a channel.
pub struct ChannelValidator {
    tx: mpsc::UnboundedSender<Uuid>,
}

impl ChannelValidator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Uuid>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Validator for ChannelValidator {
    fn validate(&self, file_id: Uuid) -> ServiceFuture<'_, ()> {
        let _ = self.tx.send(file_id);
        Box::pin(async { Ok(()) })
    }
}

/// Reports every forwarded chunk on a channel.
pub struct ChannelForwarder {
    tx: mpsc::UnboundedSender<PersistedChunk>,
}

impl ChannelForwarder {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PersistedChunk>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Forwarder for ChannelForwarder {
    fn forward(&self, chunk: PersistedChunk) -> ServiceFuture<'_, ()> {
        let _ = self.tx.send(chunk);
        Box::pin(async { Ok(()) })
    }
}

/// Counts calls and always fails.
#[derive(Default)]
pub struct FailingValidator {
    pub calls: AtomicUsize,
}

impl Validator for FailingValidator {
    fn validate(&self, file_id: Uuid) -> ServiceFuture<'_, ()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            Err(ServiceError::Corrupt {
                file_id,
                chunks: vec!["c1".into()],
            })
        })
    }
}

/// A persisted-chunk record for `data` under a fresh file id.
pub fn persisted(chunk_name: &str, data: &[u8]) -> PersistedChunk {
    let file_id = Uuid::new_v4();
    PersistedChunk {
        metadata: ChunkMetadata::new(file_id, chunk_name),
        path: PathBuf::from(format!("{file_id}/{chunk_name}.chunk")),
        digest: checksum_bytes(data),
        size: data.len() as u64,
    }
}
