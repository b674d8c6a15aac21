//! Request processing context
//!
//! One `Context` is built per server instance from the loaded
//! configuration and passed explicitly (behind an `Arc`) through every
//! pipeline stage. No stage reads configuration from anywhere else.

use std::sync::Arc;
use std::time::Duration;

use crate::detection::Detector;
use crate::engine::Engine;
use crate::filters::FilterRegistry;
use crate::loaders::Loader;
use crate::result_storages::ResultStorage;
use crate::storages::Storage;

pub struct Context {
    // Security
    pub security_key: String,
    pub allow_unsafe_url: bool,
    pub allow_old_urls: bool,
    pub stores_crypto_key_per_image: bool,

    // Output policy
    pub auto_webp: bool,
    pub default_quality: u8,
    pub result_ttl: Duration,

    // Handler-level denial
    pub blocked_paths: Vec<String>,

    // Bound modules
    pub loader: Arc<dyn Loader>,
    pub storage: Arc<dyn Storage>,
    pub result_storage: Option<Arc<dyn ResultStorage>>,
    pub engine: Arc<dyn Engine>,
    pub filters: FilterRegistry,
    pub detector: Arc<dyn Detector>,
}

impl Context {
    /// Whether this image path matches a blocked-path pattern.
    pub fn is_blocked(&self, image_path: &str) -> bool {
        self.blocked_paths
            .iter()
            .any(|pattern| glob_match(pattern, image_path))
    }
}

/// Simple glob pattern matching.
///
/// Supports `*`/`**` alone, `*suffix`, `prefix*` and exact matches.
/// Wildcards in the middle of a pattern are not supported.
fn glob_match(pattern: &str, text: &str) -> bool {
    if pattern == "*" || pattern == "**" {
        return true;
    }
    if let Some(suffix) = pattern.strip_prefix('*') {
        return text.ends_with(suffix);
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return text.starts_with(prefix);
    }
    pattern == text
}
