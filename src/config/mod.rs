// Configuration module

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{
    DEFAULT_ADDRESS, DEFAULT_PORT, DEFAULT_QUALITY, DEFAULT_RESULT_CACHE_BYTES,
    DEFAULT_RESULT_TTL_SECS, DEFAULT_SOURCE_CACHE_BYTES,
};

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

fn default_loader_kind() -> String {
    "file".to_string()
}

fn default_storage_kind() -> String {
    "noop".to_string()
}

fn default_result_storage_kind() -> String {
    "noop".to_string()
}

fn default_engine_kind() -> String {
    "image".to_string()
}

fn default_result_ttl() -> u64 {
    DEFAULT_RESULT_TTL_SECS
}

fn default_source_cache_bytes() -> u64 {
    DEFAULT_SOURCE_CACHE_BYTES
}

fn default_result_cache_bytes() -> u64 {
    DEFAULT_RESULT_CACHE_BYTES
}

/// Top-level service configuration, loaded once at startup from a YAML file.
///
/// Every pipeline stage reads configuration exclusively through the
/// `Context` built from this value; nothing reads ambient state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    /// HMAC signing secret for URL authorization.
    ///
    /// The `SECURITY_KEY` environment variable overrides this value.
    pub security_key: String,

    /// Accept requests whose first path segment is the literal `unsafe`
    #[serde(default)]
    pub allow_unsafe_url: bool,

    /// Accept URLs signed with a historical key recorded in storage
    #[serde(default)]
    pub allow_old_urls: bool,

    /// Record the signing key per image on first fetch (enables key rotation)
    #[serde(default)]
    pub stores_crypto_key_for_each_image: bool,

    /// Re-encode eligible sources as WebP for clients that accept it
    #[serde(default)]
    pub auto_webp: bool,

    /// Glob patterns for image paths this deployment refuses to serve (403)
    #[serde(default)]
    pub blocked_paths: Vec<String>,

    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub result_storage: ResultStorageConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    /// Default quality for lossy output formats when no quality filter is given
    #[serde(default = "default_quality")]
    pub default_quality: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Registered loader name (e.g. "file")
    #[serde(default = "default_loader_kind")]
    pub kind: String,
    /// Root directory for the file loader
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_root: Option<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            kind: default_loader_kind(),
            file_root: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Registered storage name: "memory", "file" or "noop"
    #[serde(default = "default_storage_kind")]
    pub kind: String,
    /// Root directory for the file storage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_root: Option<String>,
    /// Capacity of the in-memory source cache in bytes
    #[serde(default = "default_source_cache_bytes")]
    pub max_cache_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: default_storage_kind(),
            file_root: None,
            max_cache_bytes: default_source_cache_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultStorageConfig {
    /// Registered result storage name: "memory" or "noop"
    #[serde(default = "default_result_storage_kind")]
    pub kind: String,
    /// TTL for rendered results in seconds
    #[serde(default = "default_result_ttl")]
    pub ttl_seconds: u64,
    /// Capacity of the in-memory result cache in bytes
    #[serde(default = "default_result_cache_bytes")]
    pub max_cache_bytes: u64,
}

impl Default for ResultStorageConfig {
    fn default() -> Self {
        Self {
            kind: default_result_storage_kind(),
            ttl_seconds: default_result_ttl(),
            max_cache_bytes: default_result_cache_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Registered engine name (e.g. "image")
    #[serde(default = "default_engine_kind")]
    pub kind: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: default_engine_kind(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// Applies the `SECURITY_KEY` environment override and validates the
    /// result before returning.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(contents: &str) -> Result<Self, String> {
        let mut config: Config =
            serde_yaml::from_str(contents).map_err(|e| format!("invalid configuration: {}", e))?;

        if let Ok(key) = std::env::var("SECURITY_KEY") {
            if !key.is_empty() {
                config.security_key = key;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.security_key.is_empty() && !self.allow_unsafe_url {
            return Err(
                "security_key must be set unless allow_unsafe_url is enabled".to_string(),
            );
        }

        if self.loader.kind == "file" && self.loader.file_root.is_none() {
            return Err("loader.file_root is required for the file loader".to_string());
        }

        if self.storage.kind == "file" && self.storage.file_root.is_none() {
            return Err("storage.file_root is required for the file storage".to_string());
        }

        if !(1..=100).contains(&self.default_quality) {
            return Err("default_quality must be between 1 and 100".to_string());
        }

        Ok(())
    }
}
