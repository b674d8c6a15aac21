//! Loader contract
//!
//! A loader turns a verified image path into raw source bytes. Loaders are
//! black boxes to the pipeline: they never panic and never propagate
//! errors: every failure is reported through [`FetchResult`] with
//! `successful == false` and a populated `loader_error`. A loader that has
//! already decoded the image may return a pre-bound engine handle so the
//! pipeline can skip its own decode.

use async_trait::async_trait;
use bytes::Bytes;

use crate::engine::ImageHandle;

pub mod file;

/// Loader failure classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    /// The source image does not exist
    NotFound,
    /// The source exists but could not be read
    FetchFailed { message: String },
    /// The loader gave up waiting on its backend
    Timeout,
}

impl std::fmt::Display for LoaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoaderError::NotFound => write!(f, "Source image not found"),
            LoaderError::FetchFailed { message } => write!(f, "Fetch failed: {}", message),
            LoaderError::Timeout => write!(f, "Fetch timed out"),
        }
    }
}

impl std::error::Error for LoaderError {}

/// Outcome of a source fetch.
///
/// Invariant: `successful` implies `buffer` or `engine` is set.
#[derive(Default)]
pub struct FetchResult {
    /// The loader rewrote the requested path
    pub normalized: bool,
    /// Raw source bytes
    pub buffer: Option<Bytes>,
    /// Pre-bound decoded handle, set when the loader already decoded
    pub engine: Option<Box<dyn ImageHandle>>,
    pub successful: bool,
    pub loader_error: Option<LoaderError>,
}

impl FetchResult {
    /// Successful fetch carrying raw bytes.
    pub fn found(buffer: Bytes) -> Self {
        Self {
            buffer: Some(buffer),
            successful: true,
            ..Default::default()
        }
    }

    /// Failed fetch with a classified error.
    pub fn failed(error: LoaderError) -> Self {
        Self {
            loader_error: Some(error),
            ..Default::default()
        }
    }
}

impl std::fmt::Debug for FetchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResult")
            .field("normalized", &self.normalized)
            .field("buffer_len", &self.buffer.as_ref().map(|b| b.len()))
            .field("engine", &self.engine.is_some())
            .field("successful", &self.successful)
            .field("loader_error", &self.loader_error)
            .finish()
    }
}

/// Pluggable source fetcher.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn fetch(&self, image_path: &str) -> FetchResult;
}
