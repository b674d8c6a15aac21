//! Source storage contract
//!
//! A storage caches raw source bytes (consulted before the loader, written
//! through after a successful fetch) and records the signing key in use
//! when an image is first stored, which is what makes key rotation with
//! `allow_old_urls` possible. All writes are best-effort: the pipeline
//! logs failures and never fails a request over them.

use async_trait::async_trait;
use bytes::Bytes;

pub mod file;
pub mod memory;
pub mod noop;

/// Storage operation failures
#[derive(Debug)]
pub enum StorageError {
    /// Underlying I/O failed
    Io(std::io::Error),
    /// Entry exceeds what this storage will hold
    TooLarge { size: usize },
    /// Backend-specific failure
    Backend(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "I/O error: {}", err),
            StorageError::TooLarge { size } => {
                write!(f, "Entry of {} bytes exceeds storage limit", size)
            }
            StorageError::Backend(msg) => write!(f, "Storage backend error: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

/// Pluggable source byte and crypto-key store.
///
/// Concurrent use from many tasks must be safe; per-key last-writer-wins
/// is sufficient, no cross-key transactions are expected.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Cached source bytes for a canonical image path.
    async fn get(&self, image_path: &str) -> Result<Option<Bytes>, StorageError>;

    /// Cache source bytes under a canonical image path.
    async fn put(&self, image_path: &str, buffer: Bytes) -> Result<(), StorageError>;

    /// Record the signing key in effect when this image was stored.
    async fn put_crypto_key(&self, image_path: &str, key: &str) -> Result<(), StorageError>;

    /// The signing key recorded for this image, if any.
    async fn get_crypto_key(&self, image_path: &str) -> Result<Option<String>, StorageError>;
}
