//! In-memory source storage
//!
//! Source bytes live in a moka cache bounded by total size; crypto-key
//! records are tiny and unbounded, so a plain locked map holds them.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use super::{Storage, StorageError};

pub struct MemoryStorage {
    buffers: moka::future::Cache<String, Bytes>,
    crypto_keys: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new(max_cache_bytes: u64) -> Self {
        let buffers = moka::future::Cache::builder()
            .max_capacity(max_cache_bytes)
            .weigher(|key: &String, value: &Bytes| {
                (key.len() + value.len()).min(u32::MAX as usize) as u32
            })
            .build();

        Self {
            buffers,
            crypto_keys: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, image_path: &str) -> Result<Option<Bytes>, StorageError> {
        Ok(self.buffers.get(image_path).await)
    }

    async fn put(&self, image_path: &str, buffer: Bytes) -> Result<(), StorageError> {
        self.buffers.insert(image_path.to_string(), buffer).await;
        Ok(())
    }

    async fn put_crypto_key(&self, image_path: &str, key: &str) -> Result<(), StorageError> {
        self.crypto_keys
            .write()
            .insert(image_path.to_string(), key.to_string());
        Ok(())
    }

    async fn get_crypto_key(&self, image_path: &str) -> Result<Option<String>, StorageError> {
        Ok(self.crypto_keys.read().get(image_path).cloned())
    }
}
