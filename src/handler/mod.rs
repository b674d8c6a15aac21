//! Request orchestrator
//!
//! Drives one request through the full pipeline:
//!
//! ```text
//! Received -> Verified -> CacheChecked -> Fetched -> Decoded
//!          -> Transformed -> Negotiated -> Encoded -> Responded
//! ```
//!
//! Every stage failure is recovered here and mapped to an HTTP status;
//! nothing propagates as a fault to the server layer. Cache writes are
//! best-effort and spawned, so an already-started write-through completes
//! even if the client goes away, and a failing cache never fails an
//! otherwise-successful request.

use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;

use crate::context::Context;
use crate::engine::{geometry, sniff_format, EngineError, ImageHandle, OutputFormat};
use crate::filters::{FilterError, OutputOptions};
use crate::loaders::{FetchResult, LoaderError};
use crate::negotiation::{self, accepts_webp};
use crate::request::{self, ParseError, RequestSpec};
use crate::signing::{self, VerificationError};

/// Response handed to the HTTP layer, mapped 1:1 onto the wire.
#[derive(Debug, Clone)]
pub struct ServiceResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ServiceResponse {
    fn ok(content_type: &str, body: Bytes) -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body,
        }
    }

    fn with_vary(mut self) -> Self {
        self.headers
            .push(("Vary".to_string(), "Accept".to_string()));
        self
    }

    fn error(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Everything that can end a request early, with its status mapping.
#[derive(Debug)]
enum PipelineError {
    Verification(VerificationError),
    Parse(ParseError),
    /// Deployment-level denial, distinct from authorization failure
    Blocked,
    Loader(LoaderError),
    Engine(EngineError),
}

impl PipelineError {
    fn to_http_status(&self) -> u16 {
        match self {
            PipelineError::Verification(_) => 400,
            PipelineError::Parse(_) => 400,
            PipelineError::Blocked => 403,
            PipelineError::Loader(_) => 404,
            PipelineError::Engine(_) => 400,
        }
    }
}

impl From<VerificationError> for PipelineError {
    fn from(e: VerificationError) -> Self {
        PipelineError::Verification(e)
    }
}

impl From<ParseError> for PipelineError {
    fn from(e: ParseError) -> Self {
        PipelineError::Parse(e)
    }
}

impl From<EngineError> for PipelineError {
    fn from(e: EngineError) -> Self {
        PipelineError::Engine(e)
    }
}

impl From<FilterError> for PipelineError {
    fn from(e: FilterError) -> Self {
        PipelineError::Parse(match e {
            FilterError::Unknown { name } => ParseError::UnknownFilter { name },
            FilterError::BadArgs { name, message } => ParseError::BadSegment {
                segment: name,
                message,
            },
        })
    }
}

/// Transform description returned for `meta` requests.
#[derive(Debug, Serialize)]
pub struct ImageMetadata {
    pub image_path: String,
    pub source_width: u32,
    pub source_height: u32,
    pub target_width: u32,
    pub target_height: u32,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    pub filters: Vec<String>,
    pub output_format: String,
}

/// Handle one request path end to end.
///
/// `raw_path` is the URL path without the leading slash; `accept` is the
/// client's `Accept` header, if any.
pub async fn handle(ctx: Arc<Context>, raw_path: &str, accept: Option<&str>) -> ServiceResponse {
    match process(ctx, raw_path, accept).await {
        Ok(response) => response,
        Err(e) => {
            let status = e.to_http_status();
            tracing::info!(status, error = %describe(&e), "request rejected");
            ServiceResponse::error(status)
        }
    }
}

fn describe(e: &PipelineError) -> String {
    match e {
        PipelineError::Verification(inner) => inner.to_string(),
        PipelineError::Parse(inner) => inner.to_string(),
        PipelineError::Blocked => "path is blocked on this deployment".to_string(),
        PipelineError::Loader(inner) => inner.to_string(),
        PipelineError::Engine(inner) => inner.to_string(),
    }
}

async fn process(
    ctx: Arc<Context>,
    raw_path: &str,
    accept: Option<&str>,
) -> Result<ServiceResponse, PipelineError> {
    // Received -> Verified
    let verified = signing::verify(raw_path, &ctx).await?;

    // Verified -> (parsed)
    let mut spec = request::parse(&verified.remainder, &ctx.filters)?;
    spec.auth_token = verified.auth_token;

    if ctx.is_blocked(&spec.image_path) {
        return Err(PipelineError::Blocked);
    }

    // CacheChecked: result lookup happens before any fetch or decode
    let webp_capable = ctx.auto_webp && accepts_webp(accept);
    let cache_key = result_cache_key(&spec, webp_capable);

    if let Some(results) = &ctx.result_storage {
        if let Ok(Some(body)) = results.get(&cache_key).await {
            tracing::debug!(key = %cache_key, "result cache hit");
            return Ok(cached_response(&spec, body, ctx.auto_webp));
        }
    }

    // CacheChecked -> Fetched
    let (fetch, from_loader) = fetch_source(&ctx, &spec).await;
    if !fetch.successful {
        let error = fetch.loader_error.unwrap_or(LoaderError::NotFound);
        return Err(PipelineError::Loader(error));
    }

    let source_bytes = fetch.buffer.clone();
    if from_loader {
        if let Some(buffer) = source_bytes.clone() {
            write_through_source(&ctx, &spec, buffer);
        }
    }

    // Fetched -> Decoded: loaders may hand over a pre-bound handle
    let mut image = match fetch.engine {
        Some(handle) => handle,
        None => match fetch.buffer.as_ref() {
            Some(buffer) => ctx.engine.decode(buffer)?,
            // A loader breaking the FetchResult invariant
            None => {
                return Err(PipelineError::Loader(LoaderError::FetchFailed {
                    message: "loader returned neither bytes nor a handle".to_string(),
                }))
            }
        },
    };

    let animated = image.is_animated();
    let (source_width, source_height) = image.dimensions();

    // Decoded -> Transformed
    let mut output = transform(&ctx, &spec, &mut image)?;

    // Meta requests stop before encoding
    if spec.meta {
        return Ok(meta_response(
            &spec,
            image.as_ref(),
            source_width,
            source_height,
            &output,
            accept,
            &ctx,
        ));
    }

    // Transformed -> Negotiated (never fails)
    let negotiated = negotiation::negotiate(&output, image.as_ref(), accept, ctx.auto_webp);

    // Negotiated -> Encoded. An untouched animation keeps its source
    // bytes instead of being flattened to its first frame.
    let passthrough = animated
        && !spec.has_transformations()
        && OutputFormat::from(image.source_format()) == negotiated.format;

    let body = match (passthrough, source_bytes) {
        (true, Some(bytes)) => bytes,
        _ => {
            let quality = output.quality.take().unwrap_or(ctx.default_quality);
            Bytes::from(image.encode(negotiated.format, quality)?)
        }
    };

    // Encoded -> Responded, with best-effort write-through
    if let Some(results) = &ctx.result_storage {
        let results = results.clone();
        let body_clone = body.clone();
        let ttl = ctx.result_ttl;
        tokio::spawn(async move {
            if let Err(e) = results.put(&cache_key, body_clone, ttl).await {
                tracing::warn!(key = %cache_key, error = %e, "result cache write failed");
            }
        });
    }

    let response = ServiceResponse::ok(negotiated.format.content_type(), body);
    Ok(if negotiated.vary_by_accept {
        response.with_vary()
    } else {
        response
    })
}

/// Result-cache key: the canonical spec key plus a capability
/// discriminator when auto-WebP negotiation is in play, so WebP-capable
/// and incapable clients never share an entry.
fn result_cache_key(spec: &RequestSpec, webp_capable: bool) -> String {
    if webp_capable {
        format!("{}/webp", spec.cache_key())
    } else {
        spec.cache_key()
    }
}

/// Consult source storage first, fall back to the loader.
async fn fetch_source(ctx: &Context, spec: &RequestSpec) -> (FetchResult, bool) {
    match ctx.storage.get(&spec.image_path).await {
        Ok(Some(buffer)) => {
            tracing::debug!(path = %spec.image_path, "source storage hit");
            (FetchResult::found(buffer), false)
        }
        Ok(None) => (ctx.loader.fetch(&spec.image_path).await, true),
        Err(e) => {
            tracing::warn!(path = %spec.image_path, error = %e, "source storage read failed");
            (ctx.loader.fetch(&spec.image_path).await, true)
        }
    }
}

/// Spawned write-through of freshly loaded source bytes and, when
/// enabled, the signing key in effect for this image.
fn write_through_source(ctx: &Arc<Context>, spec: &RequestSpec, buffer: Bytes) {
    let storage = ctx.storage.clone();
    let path = spec.image_path.clone();
    let record_key = ctx
        .stores_crypto_key_per_image
        .then(|| ctx.security_key.clone());

    tokio::spawn(async move {
        if let Err(e) = storage.put(&path, buffer).await {
            tracing::warn!(path = %path, error = %e, "source storage write failed");
        }
        if let Some(key) = record_key {
            if let Err(e) = storage.put_crypto_key(&path, &key).await {
                tracing::warn!(path = %path, error = %e, "crypto key write failed");
            }
        }
    });
}

/// Apply geometry and filters to the decoded image.
fn transform(
    ctx: &Context,
    spec: &RequestSpec,
    image: &mut Box<dyn ImageHandle>,
) -> Result<OutputOptions, PipelineError> {
    if let Some(area) = spec.crop {
        image.crop(area);
    }

    let focal = if spec.smart {
        ctx.detector.detect(image.as_ref())
    } else {
        None
    };

    let resolved = geometry::resolve(spec, image.dimensions(), focal);

    if let Some(area) = resolved.crop {
        image.crop(area);
    }
    if let Some((width, height)) = resolved.resize_to {
        image.resize(width, height)?;
    }
    if resolved.flip_horizontal {
        image.flip_horizontal();
    }
    if resolved.flip_vertical {
        image.flip_vertical();
    }

    let mut output = OutputOptions {
        requested: resolved.fit_box.or(resolved.resize_to),
        ..Default::default()
    };

    for filter_spec in &spec.filters {
        let filter = ctx.filters.build(&filter_spec.name, &filter_spec.args)?;
        filter.apply(image, &mut output)?;
    }

    Ok(output)
}

/// Response for a result-cache hit; Content-Type is sniffed from the
/// stored bytes.
fn cached_response(spec: &RequestSpec, body: Bytes, auto_webp: bool) -> ServiceResponse {
    let content_type = if spec.meta {
        "application/json"
    } else {
        sniff_format(&body)
            .map(|f| f.content_type())
            .unwrap_or("application/octet-stream")
    };

    let response = ServiceResponse::ok(content_type, body);
    // Entries under auto-WebP are keyed by client capability, so the
    // representation varies by Accept.
    if auto_webp && !spec.meta {
        response.with_vary()
    } else {
        response
    }
}

fn meta_response(
    spec: &RequestSpec,
    image: &dyn ImageHandle,
    source_width: u32,
    source_height: u32,
    output: &OutputOptions,
    accept: Option<&str>,
    ctx: &Context,
) -> ServiceResponse {
    let negotiated = negotiation::negotiate(output, image, accept, ctx.auto_webp);
    let (target_width, target_height) = image.dimensions();

    let metadata = ImageMetadata {
        image_path: spec.image_path.clone(),
        source_width,
        source_height,
        target_width,
        target_height,
        flip_horizontal: spec.target_width.map_or(false, |w| w < 0),
        flip_vertical: spec.target_height.map_or(false, |h| h < 0),
        filters: spec
            .filters
            .iter()
            .map(|f| format!("{}({})", f.name, f.args))
            .collect(),
        output_format: negotiated.format.as_str().to_string(),
    };

    let body = serde_json::to_vec(&metadata).unwrap_or_default();
    ServiceResponse::ok("application/json", Bytes::from(body))
}
