//! Handoff from synchronous ingestion to downstream processing.
//!
//! Registration is awaited; validation and forwarding are queued with
//! `try_send` and drained by worker tasks, so a slow or failing
//! collaborator never delays or changes an upload's response.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, warn};
use uuid::Uuid;

use chunknode_protocol::ChunkMetadata;

use crate::services::{Forwarder, MetadataService, Validator};

/// Read-only description of a chunk that has been written and synced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedChunk {
    pub metadata: ChunkMetadata,
    pub path: PathBuf,
    pub digest: String,
    pub size: u64,
}

/// Registers persisted chunks and dispatches their async follow-up work.
pub struct Handoff {
    metadata: Arc<dyn MetadataService>,
    validate_tx: mpsc::Sender<Uuid>,
    forward_tx: mpsc::Sender<PersistedChunk>,
}

impl Handoff {
    /// Creates a handoff over caller-owned queues.
    pub fn new(
        metadata: Arc<dyn MetadataService>,
        validate_tx: mpsc::Sender<Uuid>,
        forward_tx: mpsc::Sender<PersistedChunk>,
    ) -> Self {
        Self {
            metadata,
            validate_tx,
            forward_tx,
        }
    }

    /// Creates the queues and spawns one worker per collaborator.
    ///
    /// Workers stop when `cancel` fires or the handoff is dropped.
    pub fn spawn(
        metadata: Arc<dyn MetadataService>,
        validator: Arc<dyn Validator>,
        forwarder: Arc<dyn Forwarder>,
        capacity: usize,
        cancel: CancellationToken,
    ) -> Self {
        let (validate_tx, validate_rx) = mpsc::channel(capacity.max(1));
        let (forward_tx, forward_rx) = mpsc::channel(capacity.max(1));

        tokio::spawn(validation_worker(validate_rx, validator, cancel.clone()).in_current_span());
        tokio::spawn(forwarding_worker(forward_rx, forwarder, cancel).in_current_span());

        Self::new(metadata, validate_tx, forward_tx)
    }

    /// Registers the chunk, then queues validation and forwarding.
    ///
    /// Replicas are validated but not forwarded, so peers that list each
    /// other never bounce a chunk back and forth.
    pub async fn run(&self, chunk: PersistedChunk) {
        let meta = &chunk.metadata;
        if let Err(e) = self
            .metadata
            .register_chunk(meta.file_id, &meta.chunk_name, &chunk.digest)
            .await
        {
            // Best effort: the chunk stays on disk without a metadata record.
            warn!(
                file_id = %meta.file_id,
                chunk = %meta.chunk_name,
                "chunk registration failed: {e}"
            );
        }

        dispatch(&self.validate_tx, meta.file_id, "validation");
        if meta.replica {
            debug!(file_id = %meta.file_id, chunk = %meta.chunk_name, "replica stored");
            return;
        }
        dispatch(&self.forward_tx, chunk, "forwarding");
    }
}

fn dispatch<T>(tx: &mpsc::Sender<T>, job: T, queue: &'static str) {
    match tx.try_send(job) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => warn!(queue, "queue full, job dropped"),
        Err(TrySendError::Closed(_)) => warn!(queue, "queue closed, job dropped"),
    }
}

async fn validation_worker(
    mut rx: mpsc::Receiver<Uuid>,
    validator: Arc<dyn Validator>,
    cancel: CancellationToken,
) {
    debug!("validation worker started");
    loop {
        let file_id = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            job = rx.recv() => match job {
                Some(id) => id,
                None => break,
            },
        };

        let validator = Arc::clone(&validator);
        tokio::spawn(
            async move {
                match validator.validate(file_id).await {
                    Ok(()) => debug!(%file_id, "validation passed"),
                    Err(e) => error!(%file_id, "validation failed: {e}"),
                }
            }
            .in_current_span(),
        );
    }
    debug!("validation worker stopped");
}

async fn forwarding_worker(
    mut rx: mpsc::Receiver<PersistedChunk>,
    forwarder: Arc<dyn Forwarder>,
    cancel: CancellationToken,
) {
    debug!("forwarding worker started");
    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            job = rx.recv() => match job {
                Some(chunk) => chunk,
                None => break,
            },
        };

        let forwarder = Arc::clone(&forwarder);
        tokio::spawn(
            async move {
                let file_id = chunk.metadata.file_id;
                let name = chunk.metadata.chunk_name.clone();
                match forwarder.forward(chunk).await {
                    Ok(()) => debug!(%file_id, chunk = %name, "chunk forwarded"),
                    Err(e) => error!(%file_id, chunk = %name, "forwarding failed: {e}"),
                }
            }
            .in_current_span(),
        );
    }
    debug!("forwarding worker stopped");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{ChannelForwarder, ChannelValidator, RecordingMetadata, persisted};

    #[tokio::test]
    async fn run_registers_then_queues_both_jobs() {
        let metadata = Arc::new(RecordingMetadata::default());
        let (vtx, mut vrx) = mpsc::channel(4);
        let (ftx, mut frx) = mpsc::channel(4);
        let handoff = Handoff::new(metadata.clone(), vtx, ftx);

        let chunk = persisted("c1", b"ABCD");
        handoff.run(chunk.clone()).await;

        let calls = metadata.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, chunk.metadata.file_id);
        assert_eq!(calls[0].1, "c1");
        assert_eq!(calls[0].2, chunk.digest);

        assert_eq!(vrx.try_recv().unwrap(), chunk.metadata.file_id);
        assert_eq!(frx.try_recv().unwrap(), chunk);
    }

    #[tokio::test]
    async fn registration_failure_still_dispatches() {
        let metadata = Arc::new(RecordingMetadata::failing());
        let (vtx, mut vrx) = mpsc::channel(4);
        let (ftx, mut frx) = mpsc::channel(4);
        let handoff = Handoff::new(metadata.clone(), vtx, ftx);

        handoff.run(persisted("c1", b"x")).await;

        assert!(vrx.try_recv().is_ok());
        assert!(frx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn replica_is_validated_but_not_forwarded() {
        let metadata = Arc::new(RecordingMetadata::default());
        let (vtx, mut vrx) = mpsc::channel(4);
        let (ftx, mut frx) = mpsc::channel(4);
        let handoff = Handoff::new(metadata.clone(), vtx, ftx);

        let mut chunk = persisted("c1", b"ABCD");
        chunk.metadata = chunk.metadata.as_replica();
        handoff.run(chunk.clone()).await;

        assert_eq!(metadata.calls().await.len(), 1);
        assert_eq!(vrx.try_recv().unwrap(), chunk.metadata.file_id);
        assert!(frx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let metadata = Arc::new(RecordingMetadata::default());
        let (vtx, mut vrx) = mpsc::channel(1);
        let (ftx, mut frx) = mpsc::channel(1);
        let handoff = Handoff::new(metadata.clone(), vtx, ftx);

        let first = persisted("c1", b"1");
        let second = persisted("c2", b"2");
        tokio::time::timeout(Duration::from_secs(1), async {
            handoff.run(first.clone()).await;
            handoff.run(second).await;
        })
        .await
        .expect("dispatch must not block on a full queue");

        assert_eq!(metadata.calls().await.len(), 2);
        assert_eq!(frx.try_recv().unwrap(), first);
        assert!(frx.try_recv().is_err());
        assert!(vrx.try_recv().is_ok());
        assert!(vrx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_queue_is_not_an_error() {
        let metadata = Arc::new(RecordingMetadata::default());
        let (vtx, vrx) = mpsc::channel(1);
        let (ftx, frx) = mpsc::channel(1);
        drop(vrx);
        drop(frx);
        let handoff = Handoff::new(metadata.clone(), vtx, ftx);

        handoff.run(persisted("c1", b"x")).await;
        assert_eq!(metadata.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn spawned_workers_invoke_collaborators() {
        let metadata = Arc::new(RecordingMetadata::default());
        let (validator, mut validated) = ChannelValidator::new();
        let (forwarder, mut forwarded) = ChannelForwarder::new();
        let cancel = CancellationToken::new();
        let handoff = Handoff::spawn(
            metadata,
            Arc::new(validator),
            Arc::new(forwarder),
            8,
            cancel.clone(),
        );

        let chunk = persisted("c1", b"data");
        handoff.run(chunk.clone()).await;

        let id = tokio::time::timeout(Duration::from_secs(1), validated.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(id, chunk.metadata.file_id);

        let sent = tokio::time::timeout(Duration::from_secs(1), forwarded.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sent, chunk);

        cancel.cancel();
    }

    #[tokio::test]
    async fn cancelled_workers_stop_draining() {
        let metadata = Arc::new(RecordingMetadata::default());
        let (validator, mut validated) = ChannelValidator::new();
        let (forwarder, mut forwarded) = ChannelForwarder::new();
        let cancel = CancellationToken::new();
        let handoff = Handoff::spawn(
            metadata,
            Arc::new(validator),
            Arc::new(forwarder),
            8,
            cancel.clone(),
        );

        cancel.cancel();
        // Let the workers observe cancellation.
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        handoff.run(persisted("c1", b"data")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(validated.try_recv().is_err());
        assert!(forwarded.try_recv().is_err());
    }
}
