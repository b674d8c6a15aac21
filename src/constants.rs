// Constants module - centralized default values for configuration
//
// This module defines the default values and hard limits used throughout
// the codebase. Using constants instead of magic numbers makes it easier
// to understand and modify defaults.

// =============================================================================
// Server defaults
// =============================================================================

/// Default listen address
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8888;

// =============================================================================
// Encoding defaults and limits
// =============================================================================

/// Default quality for lossy output formats (JPEG, WebP)
pub const DEFAULT_QUALITY: u8 = 80;

/// Maximum pixel count a standard WebP encoder accepts.
///
/// Sources above this size are never auto-converted to WebP; the request
/// degrades gracefully to the source format instead of failing.
pub const MAX_WEBP_PIXELS: u64 = 89_478_485;

// =============================================================================
// Cache defaults
// =============================================================================

/// Default TTL for rendered results in the result storage (1 hour)
pub const DEFAULT_RESULT_TTL_SECS: u64 = 3600;

/// Default capacity for the in-memory source storage (256 MB)
pub const DEFAULT_SOURCE_CACHE_BYTES: u64 = 256 * 1024 * 1024;

/// Default capacity for the in-memory result storage (256 MB)
pub const DEFAULT_RESULT_CACHE_BYTES: u64 = 256 * 1024 * 1024;

// =============================================================================
// URL grammar
// =============================================================================

/// Literal first path segment that marks a request as unsigned.
///
/// Accepted only when `allow_unsafe_url` is enabled.
pub const UNSAFE_SENTINEL: &str = "unsafe";
