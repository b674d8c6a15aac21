//! In-memory result storage backed by moka
//!
//! Entries expire per-entry: moka's expiry hook reads the TTL recorded
//! alongside each entry, so differently configured deployments sharing
//! this type still honor their own lifetimes.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use moka::Expiry;

use super::ResultStorage;
use crate::storages::StorageError;

#[derive(Clone)]
struct StoredResult {
    buffer: Bytes,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, StoredResult> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredResult,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

pub struct MemoryResultStorage {
    cache: moka::future::Cache<String, StoredResult>,
}

impl MemoryResultStorage {
    pub fn new(max_cache_bytes: u64) -> Self {
        let cache = moka::future::Cache::builder()
            .max_capacity(max_cache_bytes)
            .weigher(|key: &String, value: &StoredResult| {
                (key.len() + value.buffer.len()).min(u32::MAX as usize) as u32
            })
            .expire_after(PerEntryTtl)
            .build();

        Self { cache }
    }
}

#[async_trait]
impl ResultStorage for MemoryResultStorage {
    async fn get(&self, cache_key: &str) -> Result<Option<Bytes>, StorageError> {
        Ok(self.cache.get(cache_key).await.map(|r| r.buffer))
    }

    async fn put(
        &self,
        cache_key: &str,
        buffer: Bytes,
        ttl: Duration,
    ) -> Result<(), StorageError> {
        self.cache
            .insert(cache_key.to_string(), StoredResult { buffer, ttl })
            .await;
        Ok(())
    }
}
