//! Content negotiation
//!
//! Decides the output format for a rendered image. Precedence, first
//! match wins:
//!
//! 1. An explicit `format(...)` filter override is honored verbatim, and
//!    the response does not vary by client capability.
//! 2. Auto-WebP: when enabled and the source is *eligible* (not already
//!    WebP, not animated, within the WebP pixel ceiling), the response
//!    representation depends on the `Accept` header, so it carries
//!    `Vary: Accept` whether or not this particular client gets WebP.
//! 3. Otherwise the source's native format is preserved and nothing
//!    varies.
//!
//! The eligibility limits are hard encoder limitations, not policy:
//! exceeding them degrades to the source format, never fails the request.

use crate::constants::MAX_WEBP_PIXELS;
use crate::engine::{ImageHandle, OutputFormat};
use crate::filters::OutputOptions;

/// Negotiated output decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    pub format: OutputFormat,
    /// Response must carry `Vary: Accept`
    pub vary_by_accept: bool,
}

/// Decide the output format for a rendered image.
pub fn negotiate(
    output: &OutputOptions,
    image: &dyn ImageHandle,
    accept_header: Option<&str>,
    auto_webp: bool,
) -> Negotiated {
    if let Some(format) = output.format {
        return Negotiated {
            format,
            vary_by_accept: false,
        };
    }

    let native: OutputFormat = image.source_format().into();

    if auto_webp && webp_eligible(image) {
        let format = if accepts_webp(accept_header) {
            OutputFormat::WebP
        } else {
            native
        };
        return Negotiated {
            format,
            vary_by_accept: true,
        };
    }

    Negotiated {
        format: native,
        vary_by_accept: false,
    }
}

/// Whether a source can be represented as static WebP at all.
fn webp_eligible(image: &dyn ImageHandle) -> bool {
    image.source_format() != crate::engine::SourceFormat::WebP
        && !image.is_animated()
        && image.pixel_count() <= MAX_WEBP_PIXELS
}

/// Parse the `Accept` header for WebP support.
///
/// Honors quality values: `image/webp;q=0` is an explicit refusal, and
/// bare wildcards do not count as WebP support (a client that wants WebP
/// says so).
pub fn accepts_webp(accept_header: Option<&str>) -> bool {
    let header = match accept_header {
        Some(h) => h,
        None => return false,
    };

    for part in header.split(',') {
        let part = part.trim();
        let (media_type, params) = match part.split_once(';') {
            Some((mt, rest)) => (mt.trim(), Some(rest)),
            None => (part, None),
        };

        if !media_type.eq_ignore_ascii_case("image/webp") {
            continue;
        }

        let quality = params.map_or(1.0, parse_quality);
        return quality > 0.0;
    }

    false
}

/// Parse a quality value from media type parameters (e.g. "q=0.8").
fn parse_quality(params: &str) -> f32 {
    for param in params.split(';') {
        let param = param.trim();
        if let Some(q) = param.strip_prefix("q=") {
            if let Ok(quality) = q.parse::<f32>() {
                return quality.clamp(0.0, 1.0);
            }
        }
    }
    1.0
}
