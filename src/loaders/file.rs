//! Filesystem loader
//!
//! Serves source images from a configured root directory. Paths are
//! validated against traversal before touching the filesystem; anything
//! that tries to escape the root reports as not found rather than leaking
//! whether the target exists.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::{FetchResult, Loader, LoaderError};

pub struct FileLoader {
    root: PathBuf,
}

impl FileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, image_path: &str) -> Option<PathBuf> {
        if has_traversal(image_path) {
            return None;
        }
        Some(self.root.join(image_path.trim_start_matches('/')))
    }
}

/// Check for path traversal attempts.
///
/// Detects `../` and `..\` (the path arrives already decoded, so encoded
/// variants collapse to these) and NUL bytes used for path truncation.
fn has_traversal(path: &str) -> bool {
    if path.contains('\0') {
        return true;
    }
    Path::new(path)
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
        || path.contains("..\\")
}

#[async_trait]
impl Loader for FileLoader {
    async fn fetch(&self, image_path: &str) -> FetchResult {
        let full_path = match self.resolve(image_path) {
            Some(p) => p,
            None => {
                tracing::warn!(path = %image_path, "rejected traversal attempt");
                return FetchResult::failed(LoaderError::NotFound);
            }
        };

        match tokio::fs::read(&full_path).await {
            Ok(contents) => FetchResult::found(Bytes::from(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                FetchResult::failed(LoaderError::NotFound)
            }
            Err(e) => FetchResult::failed(LoaderError::FetchFailed {
                message: e.to_string(),
            }),
        }
    }
}
