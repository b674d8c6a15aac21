//! URL authorization
//!
//! Every request path is either signed or explicitly unsafe:
//! - `/{signature}/{options.../image}`: the first segment is an
//!   HMAC-SHA256 token computed over the raw remainder of the path.
//! - `/unsafe/{options.../image}`: accepted only when the deployment
//!   enables `allow_unsafe_url`.
//!
//! The signature always covers the literal, still percent-encoded remainder
//! (including any encoded querystring or fragment suffix); decoding happens
//! once, after verification, so an encoded path cannot be smuggled past the
//! check by double-decoding.
//!
//! Key rotation: when `allow_old_urls` and `stores_crypto_key_for_each_image`
//! are both enabled, a signature that fails under the current key is retried
//! with the key recorded in storage for that image at first fetch.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::constants::UNSAFE_SENTINEL;
use crate::context::Context;
use crate::request;

type HmacSha256 = Hmac<Sha256>;

/// Authorization failure reasons
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// Path used the unsafe sentinel but the deployment forbids it
    UnsafeNotAllowed,
    /// Signature missing, malformed, or not valid under any known key
    InvalidSignature,
}

impl std::fmt::Display for VerificationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationError::UnsafeNotAllowed => {
                write!(f, "Unsafe URLs are not allowed on this server")
            }
            VerificationError::InvalidSignature => write!(f, "Invalid or missing URL signature"),
        }
    }
}

impl std::error::Error for VerificationError {}

/// Outcome of successful authorization
#[derive(Debug, Clone)]
pub struct VerifiedRequest {
    /// The token that authorized the request: a signature or the unsafe sentinel
    pub auth_token: String,
    /// The path remainder after the token, still percent-encoded
    pub remainder: String,
}

/// Sign a path remainder with the given key.
///
/// Returns the base64url (no padding) encoding of
/// `HMAC-SHA256(key, remainder)`. The dual of [`verify`]: a URL built as
/// `/{sign(rest, key)}/{rest}` verifies under the same key.
pub fn sign(remainder: &str, key: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(remainder.as_bytes());
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

/// Authorize a raw request path (without the leading slash).
///
/// On success returns the verified remainder for the spec parser. The
/// storage bound in the context is consulted only on the key-rotation
/// fallback path.
pub async fn verify(raw_path: &str, ctx: &Context) -> Result<VerifiedRequest, VerificationError> {
    // Unsafe sentinel short-circuits signature checking entirely
    if let Some(rest) = strip_sentinel(raw_path) {
        if !ctx.allow_unsafe_url {
            return Err(VerificationError::UnsafeNotAllowed);
        }
        return Ok(VerifiedRequest {
            auth_token: UNSAFE_SENTINEL.to_string(),
            remainder: rest.to_string(),
        });
    }

    let (token, remainder) = raw_path
        .split_once('/')
        .ok_or(VerificationError::InvalidSignature)?;

    if token.is_empty() || remainder.is_empty() {
        return Err(VerificationError::InvalidSignature);
    }

    let expected = sign(remainder, ctx.security_key.as_bytes());
    if constant_time_compare(token, &expected) {
        return Ok(VerifiedRequest {
            auth_token: token.to_string(),
            remainder: remainder.to_string(),
        });
    }

    // Key rotation: retry with the key stored for this image, if any
    if ctx.allow_old_urls && ctx.stores_crypto_key_per_image {
        if let Some(image_path) = request::canonical_image_path(remainder) {
            if let Ok(Some(old_key)) = ctx.storage.get_crypto_key(&image_path).await {
                let with_old = sign(remainder, old_key.as_bytes());
                if constant_time_compare(token, &with_old) {
                    return Ok(VerifiedRequest {
                        auth_token: token.to_string(),
                        remainder: remainder.to_string(),
                    });
                }
            }
        }
    }

    Err(VerificationError::InvalidSignature)
}

/// Strip the unsafe sentinel segment, returning the remainder.
///
/// `unsafe/` must be a complete segment: a path like `unsafeimg.jpg` is a
/// signature token, not a sentinel.
fn strip_sentinel(raw_path: &str) -> Option<&str> {
    raw_path
        .strip_prefix(UNSAFE_SENTINEL)
        .and_then(|rest| rest.strip_prefix('/'))
}

/// Constant-time string comparison to prevent timing attacks
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
