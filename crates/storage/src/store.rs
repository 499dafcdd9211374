use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use chunknode_protocol::{CHUNK_EXTENSION, ChunkMetadata};

use crate::locks::KeyedLocks;
use crate::{StorageError, validate_chunk_name};

/// A boxed future returned by storage trait methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// The open destination of one in-flight upload.
///
/// Owned by exactly one upload; never shared.
pub trait ChunkWriter: Send {
    /// Persists `data` at the current end of the chunk.
    ///
    /// Returns only once the bytes have reached the file, so a failed write
    /// is reported for the frame that caused it.
    fn write_frame<'a>(&'a mut self, data: &'a [u8]) -> StoreFuture<'a, ()>;

    /// Flushes file contents to durable storage.
    fn sync(&mut self) -> StoreFuture<'_, ()>;

    /// Location of the chunk on disk.
    fn path(&self) -> &Path;
}

/// Opens chunk destinations for uploads.
pub trait ChunkBackend: Send + Sync + 'static {
    type Writer: ChunkWriter + 'static;

    /// Resolves the file's directory and creates the chunk's backing file.
    fn open_chunk<'a>(&'a self, meta: &'a ChunkMetadata) -> StoreFuture<'a, Self::Writer>;
}

// ---------------------------------------------------------------------------
// ChunkStore
// ---------------------------------------------------------------------------

/// Filesystem chunk store rooted at a directory.
///
/// Layout: `<root>/<file_id>/<chunk_name>.chunk`.
pub struct ChunkStore {
    root: PathBuf,
    dir_locks: KeyedLocks<Uuid>,
}

impl ChunkStore {
    /// Creates a store rooted at `root`. Nothing is created on disk until
    /// the first chunk arrives.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dir_locks: KeyedLocks::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every chunk of `file_id`.
    pub fn directory_for(&self, file_id: Uuid) -> PathBuf {
        self.root.join(file_id.to_string())
    }

    /// Path of a chunk file, whether or not it exists.
    pub fn chunk_path(&self, file_id: Uuid, chunk_name: &str) -> PathBuf {
        chunk_file_path(&self.directory_for(file_id), chunk_name)
    }

    /// Creates the directory for `file_id` (and any missing parents).
    ///
    /// Concurrent callers for the same `file_id` are serialized; an
    /// existing directory is not an error.
    pub async fn ensure_directory(&self, file_id: Uuid) -> Result<PathBuf, StorageError> {
        let path = self.directory_for(file_id);
        let _guard = self.dir_locks.lock(&file_id).await;
        tokio::fs::create_dir_all(&path).await?;
        Ok(path)
    }

    /// Creates (or truncates) the backing file for `chunk_name` in `dir`.
    pub async fn create_chunk_file(
        &self,
        dir: &Path,
        chunk_name: &str,
    ) -> Result<ChunkFile, StorageError> {
        validate_chunk_name(chunk_name)?;
        let path = chunk_file_path(dir, chunk_name);
        let file = tokio::fs::File::create(&path).await?;
        debug!(path = %path.display(), "chunk file created");
        Ok(ChunkFile { file, path })
    }
}

impl ChunkBackend for ChunkStore {
    type Writer = ChunkFile;

    fn open_chunk<'a>(&'a self, meta: &'a ChunkMetadata) -> StoreFuture<'a, ChunkFile> {
        Box::pin(async move {
            // Reject bad names before touching the filesystem.
            validate_chunk_name(&meta.chunk_name)?;
            let dir = self.ensure_directory(meta.file_id).await?;
            self.create_chunk_file(&dir, &meta.chunk_name).await
        })
    }
}

fn chunk_file_path(dir: &Path, chunk_name: &str) -> PathBuf {
    dir.join(format!("{chunk_name}.{CHUNK_EXTENSION}"))
}

// ---------------------------------------------------------------------------
// ChunkFile
// ---------------------------------------------------------------------------

/// A chunk file being written by one upload.
pub struct ChunkFile {
    file: tokio::fs::File,
    path: PathBuf,
}

impl ChunkWriter for ChunkFile {
    fn write_frame<'a>(&'a mut self, data: &'a [u8]) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.file.write_all(data).await?;
            // tokio hands writes to a blocking thread; flush waits for the
            // result so the error belongs to this frame.
            self.file.flush().await?;
            Ok(())
        })
    }

    fn sync(&mut self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.file.flush().await?;
            self.file.sync_all().await?;
            Ok(())
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
