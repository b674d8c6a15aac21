//! Module registry
//!
//! Maps the configuration's backend selector strings to concrete module
//! instances, resolved exactly once at startup into a [`Context`]. There
//! is no runtime dynamic resolution: an unknown name fails startup with a
//! clear message.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::context::Context;
use crate::detection::{Detector, NoopDetector};
use crate::engine::image_engine::ImageCrateEngine;
use crate::engine::Engine;
use crate::filters::FilterRegistry;
use crate::loaders::file::FileLoader;
use crate::loaders::Loader;
use crate::result_storages::memory::MemoryResultStorage;
use crate::result_storages::ResultStorage;
use crate::storages::file::FileStorage;
use crate::storages::memory::MemoryStorage;
use crate::storages::noop::NoopStorage;
use crate::storages::Storage;

fn build_loader(config: &Config) -> Result<Arc<dyn Loader>, String> {
    match config.loader.kind.as_str() {
        "file" => {
            let root = config
                .loader
                .file_root
                .as_ref()
                .ok_or("loader.file_root is required for the file loader")?;
            Ok(Arc::new(FileLoader::new(root)))
        }
        other => Err(format!("unknown loader: {}", other)),
    }
}

fn build_storage(config: &Config) -> Result<Arc<dyn Storage>, String> {
    match config.storage.kind.as_str() {
        "memory" => Ok(Arc::new(MemoryStorage::new(config.storage.max_cache_bytes))),
        "file" => {
            let root = config
                .storage
                .file_root
                .as_ref()
                .ok_or("storage.file_root is required for the file storage")?;
            Ok(Arc::new(FileStorage::new(root)))
        }
        "noop" => Ok(Arc::new(NoopStorage)),
        other => Err(format!("unknown storage: {}", other)),
    }
}

fn build_result_storage(config: &Config) -> Result<Option<Arc<dyn ResultStorage>>, String> {
    match config.result_storage.kind.as_str() {
        "memory" => Ok(Some(Arc::new(MemoryResultStorage::new(
            config.result_storage.max_cache_bytes,
        )))),
        "noop" => Ok(None),
        other => Err(format!("unknown result storage: {}", other)),
    }
}

fn build_engine(config: &Config) -> Result<Arc<dyn Engine>, String> {
    match config.engine.kind.as_str() {
        "image" => Ok(Arc::new(ImageCrateEngine)),
        other => Err(format!("unknown engine: {}", other)),
    }
}

fn build_detector(_config: &Config) -> Arc<dyn Detector> {
    // Focal-point detectors plug in here; none ship with the service.
    Arc::new(NoopDetector)
}

/// Resolve every configured module and assemble the context.
pub fn build_context(config: &Config) -> Result<Arc<Context>, String> {
    Ok(Arc::new(Context {
        security_key: config.security_key.clone(),
        allow_unsafe_url: config.allow_unsafe_url,
        allow_old_urls: config.allow_old_urls,
        stores_crypto_key_per_image: config.stores_crypto_key_for_each_image,
        auto_webp: config.auto_webp,
        default_quality: config.default_quality,
        result_ttl: Duration::from_secs(config.result_storage.ttl_seconds),
        blocked_paths: config.blocked_paths.clone(),
        loader: build_loader(config)?,
        storage: build_storage(config)?,
        result_storage: build_result_storage(config)?,
        engine: build_engine(config)?,
        filters: FilterRegistry::standard(),
        detector: build_detector(config),
    }))
}
