//! Result storage contract
//!
//! Caches fully rendered output bytes keyed by the verified request, so a
//! repeated request skips fetch, decode and encode entirely. Keys are
//! derived from the full [`RequestSpec`](crate::request::RequestSpec) plus
//! the WebP capability discriminator, which makes them computable before
//! any engine work. The Content-Type of a hit is re-derived by sniffing
//! the stored magic bytes.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::storages::StorageError;

pub mod memory;

/// Pluggable rendered-result cache.
#[async_trait]
pub trait ResultStorage: Send + Sync {
    /// Stored output bytes for a cache key, if present and fresh.
    async fn get(&self, cache_key: &str) -> Result<Option<Bytes>, StorageError>;

    /// Store output bytes under a cache key with a TTL.
    async fn put(&self, cache_key: &str, buffer: Bytes, ttl: Duration)
        -> Result<(), StorageError>;
}
