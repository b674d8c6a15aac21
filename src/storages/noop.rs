//! Disabled source storage
//!
//! Every read misses and every write succeeds without storing anything.
//! Bound when a deployment wants the loader hit on every request.

use async_trait::async_trait;
use bytes::Bytes;

use super::{Storage, StorageError};

pub struct NoopStorage;

#[async_trait]
impl Storage for NoopStorage {
    async fn get(&self, _image_path: &str) -> Result<Option<Bytes>, StorageError> {
        Ok(None)
    }

    async fn put(&self, _image_path: &str, _buffer: Bytes) -> Result<(), StorageError> {
        Ok(())
    }

    async fn put_crypto_key(&self, _image_path: &str, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }

    async fn get_crypto_key(&self, _image_path: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }
}
