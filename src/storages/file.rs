//! Filesystem source storage
//!
//! Mirrors fetched sources under a root directory so repeated requests for
//! the same image skip the loader. The crypto-key record for an image is a
//! sibling file with a `.key` suffix.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::{Storage, StorageError};

pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn data_path(&self, image_path: &str) -> Option<PathBuf> {
        if has_traversal(image_path) {
            return None;
        }
        Some(self.root.join(image_path.trim_start_matches('/')))
    }

    fn key_path(&self, image_path: &str) -> Option<PathBuf> {
        self.data_path(image_path)
            .map(|p| p.with_extension(extension_with_suffix(&p, "key")))
    }
}

fn has_traversal(path: &str) -> bool {
    path.contains('\0')
        || Path::new(path)
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
}

fn extension_with_suffix(path: &Path, suffix: &str) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{}", ext, suffix),
        None => suffix.to_string(),
    }
}

async fn write_creating_dirs(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    Ok(())
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, image_path: &str) -> Result<Option<Bytes>, StorageError> {
        let path = match self.data_path(image_path) {
            Some(p) => p,
            None => return Ok(None),
        };
        match tokio::fs::read(&path).await {
            Ok(contents) => Ok(Some(Bytes::from(contents))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, image_path: &str, buffer: Bytes) -> Result<(), StorageError> {
        let path = self
            .data_path(image_path)
            .ok_or_else(|| StorageError::Backend("invalid storage path".to_string()))?;
        write_creating_dirs(&path, &buffer).await
    }

    async fn put_crypto_key(&self, image_path: &str, key: &str) -> Result<(), StorageError> {
        let path = self
            .key_path(image_path)
            .ok_or_else(|| StorageError::Backend("invalid storage path".to_string()))?;
        write_creating_dirs(&path, key.as_bytes()).await
    }

    async fn get_crypto_key(&self, image_path: &str) -> Result<Option<String>, StorageError> {
        let path = match self.key_path(image_path) {
            Some(p) => p,
            None => return Ok(None),
        };
        match tokio::fs::read_to_string(&path).await {
            Ok(key) => Ok(Some(key)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
