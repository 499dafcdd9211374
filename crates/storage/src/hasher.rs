use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::{HashError, StorageError};

/// Largest message SHA-256 is defined for, in bytes (2^64 bits).
const MAX_DIGEST_INPUT: u64 = (1 << 61) - 1;

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Computes SHA-256 of an entire file and returns the hex-encoded digest.
pub fn calculate_file_checksum(path: &Path) -> Result<String, StorageError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// IntegrityHasher
// ---------------------------------------------------------------------------

/// Running SHA-256 over the bytes of one upload.
///
/// Callers feed only bytes that were already persisted. [`finalize`]
/// consumes the hasher, so a digest is produced at most once.
///
/// [`finalize`]: IntegrityHasher::finalize
pub struct IntegrityHasher {
    inner: Sha256,
    len: u64,
    limit: u64,
}

impl Default for IntegrityHasher {
    fn default() -> Self {
        Self::with_limit(MAX_DIGEST_INPUT)
    }
}

impl IntegrityHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A hasher that refuses input past `limit` bytes.
    ///
    /// The limit never exceeds what SHA-256 is defined for.
    pub fn with_limit(limit: u64) -> Self {
        Self {
            inner: Sha256::new(),
            len: 0,
            limit: limit.min(MAX_DIGEST_INPUT),
        }
    }

    /// Appends `data` to the running digest.
    pub fn update(&mut self, data: &[u8]) -> Result<(), HashError> {
        let len = self
            .len
            .checked_add(data.len() as u64)
            .filter(|&n| n <= self.limit)
            .ok_or(HashError::LengthOverflow { max: self.limit })?;
        self.inner.update(data);
        self.len = len;
        Ok(())
    }

    /// Number of bytes hashed so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Produces the lowercase hex digest.
    pub fn finalize(self) -> String {
        hex::encode(self.inner.finalize())
    }
}
