//! Request spec parsing
//!
//! Turns the verified path remainder into an immutable [`RequestSpec`].
//! The grammar is a fixed-order sequence of optional segments followed by
//! the required image path:
//!
//! ```text
//! [meta/][L x T : R x B/][fit-in/][WxH/][halign/][valign/][smart/]
//! [filters:name(args)[:name(args)]*/]<image path>
//! ```
//!
//! An option segment is only consumed when more path follows it, so a file
//! that happens to be named like an option (`/unsafe/smart`) still resolves
//! as an image path. The image path is percent-decoded exactly once, here,
//! after signature verification.

use std::sync::OnceLock;

use regex::Regex;

use crate::engine::CropBox;
use crate::filters::{FilterError, FilterRegistry};

/// Spec parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Nothing remained for the image path
    MissingImage,
    /// A recognized segment failed to parse
    BadSegment { segment: String, message: String },
    /// A filter name is not registered
    UnknownFilter { name: String },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::MissingImage => write!(f, "URL does not contain an image path"),
            ParseError::BadSegment { segment, message } => {
                write!(f, "Invalid segment '{}': {}", segment, message)
            }
            ParseError::UnknownFilter { name } => write!(f, "Unknown filter: {}", name),
        }
    }
}

impl std::error::Error for ParseError {}

/// Horizontal alignment for aspect cropping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// Vertical alignment for aspect cropping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VAlign {
    Top,
    #[default]
    Middle,
    Bottom,
}

/// A named filter reference with its raw argument string.
///
/// Names are validated against the registry at parse time; instances are
/// built later by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub name: String,
    pub args: String,
}

/// Parsed, immutable description of one transform request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    /// Signature token or the unsafe sentinel that authorized the request
    pub auth_token: String,
    /// Explicit crop window, applied before everything else
    pub crop: Option<CropBox>,
    /// Fit inside the target box instead of cropping to fill it
    pub fit_in: bool,
    /// Target width; negative mirrors horizontally, 0/absent derives from height
    pub target_width: Option<i32>,
    /// Target height; negative mirrors vertically, 0/absent derives from width
    pub target_height: Option<i32>,
    pub halign: HAlign,
    pub valign: VAlign,
    /// Ask the bound detector for a focal point when cropping
    pub smart: bool,
    /// Return transform metadata as JSON instead of image bytes
    pub meta: bool,
    /// Filters in URL order
    pub filters: Vec<FilterSpec>,
    /// Decoded, canonical loader path (querystring/fragment markers stripped)
    pub image_path: String,
}

impl RequestSpec {
    /// Deterministic result-cache key for this spec.
    ///
    /// Two requests resolving to the same transform always produce the
    /// same key; every option participates in canonical order.
    pub fn cache_key(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if self.meta {
            parts.push("meta".to_string());
        }
        if let Some(c) = self.crop {
            parts.push(format!("{}x{}:{}x{}", c.left, c.top, c.right, c.bottom));
        }
        if self.fit_in {
            parts.push("fit-in".to_string());
        }
        if self.target_width.is_some() || self.target_height.is_some() {
            parts.push(format!(
                "{}x{}",
                self.target_width.unwrap_or(0),
                self.target_height.unwrap_or(0)
            ));
        }
        if self.halign != HAlign::Center {
            parts.push(format!("{:?}", self.halign).to_lowercase());
        }
        if self.valign != VAlign::Middle {
            parts.push(format!("{:?}", self.valign).to_lowercase());
        }
        if self.smart {
            parts.push("smart".to_string());
        }
        for filter in &self.filters {
            parts.push(format!("{}({})", filter.name, filter.args));
        }
        parts.push(self.image_path.clone());

        parts.join("/")
    }

    /// Whether any geometric transform or filter applies.
    pub fn has_transformations(&self) -> bool {
        self.crop.is_some()
            || self.fit_in
            || self.target_width.map_or(false, |w| w != 0)
            || self.target_height.map_or(false, |h| h != 0)
            || self.smart
            || !self.filters.is_empty()
    }
}

fn crop_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)x(\d+):(\d+)x(\d+)$").expect("valid crop regex"))
}

fn dimensions_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(-?\d*)x(-?\d*)$").expect("valid dimensions regex"))
}

fn filter_call_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([a-zA-Z_][a-zA-Z0-9_]*)\((.*)\)$").expect("valid filter regex"))
}

/// Raw option segments split from the remainder, before decoding.
#[derive(Debug, Default)]
struct RawOptions {
    meta: bool,
    crop: Option<CropBox>,
    fit_in: bool,
    width: Option<i32>,
    height: Option<i32>,
    halign: Option<HAlign>,
    valign: Option<VAlign>,
    smart: bool,
    filters: Vec<FilterSpec>,
}

/// Split one path segment off the front, returning it and the rest.
///
/// Returns `None` when the rest after the slash would be empty; option
/// segments must be followed by more path.
fn split_segment(s: &str) -> Option<(&str, &str)> {
    let (seg, rest) = s.split_once('/')?;
    if rest.is_empty() {
        return None;
    }
    Some((seg, rest))
}

/// Recognize the fixed-order option segments, returning them with the raw
/// (still encoded) image remainder.
fn split_options(remainder: &str) -> Result<(RawOptions, &str), ParseError> {
    let mut options = RawOptions::default();
    let mut rest = remainder;

    if let Some((seg, tail)) = split_segment(rest) {
        if seg == "meta" {
            options.meta = true;
            rest = tail;
        }
    }

    if let Some((seg, tail)) = split_segment(rest) {
        if let Some(caps) = crop_regex().captures(seg) {
            let parse = |i: usize| -> Result<u32, ParseError> {
                caps[i].parse().map_err(|_| ParseError::BadSegment {
                    segment: seg.to_string(),
                    message: "crop coordinate out of range".to_string(),
                })
            };
            let area = CropBox {
                left: parse(1)?,
                top: parse(2)?,
                right: parse(3)?,
                bottom: parse(4)?,
            };
            if area.right <= area.left || area.bottom <= area.top {
                return Err(ParseError::BadSegment {
                    segment: seg.to_string(),
                    message: "crop window is empty".to_string(),
                });
            }
            options.crop = Some(area);
            rest = tail;
        }
    }

    if let Some((seg, tail)) = split_segment(rest) {
        if seg == "fit-in" {
            options.fit_in = true;
            rest = tail;
        }
    }

    if let Some((seg, tail)) = split_segment(rest) {
        if let Some(caps) = dimensions_regex().captures(seg) {
            let parse_axis = |text: &str| -> Result<Option<i32>, ParseError> {
                if text.is_empty() {
                    return Ok(Some(0));
                }
                text.parse().map(Some).map_err(|_| ParseError::BadSegment {
                    segment: seg.to_string(),
                    message: "dimension out of range".to_string(),
                })
            };
            options.width = parse_axis(&caps[1])?;
            options.height = parse_axis(&caps[2])?;
            rest = tail;
        }
    }

    if let Some((seg, tail)) = split_segment(rest) {
        match seg {
            "left" => {
                options.halign = Some(HAlign::Left);
                rest = tail;
            }
            "center" => {
                options.halign = Some(HAlign::Center);
                rest = tail;
            }
            "right" => {
                options.halign = Some(HAlign::Right);
                rest = tail;
            }
            _ => {}
        }
    }

    if let Some((seg, tail)) = split_segment(rest) {
        match seg {
            "top" => {
                options.valign = Some(VAlign::Top);
                rest = tail;
            }
            "middle" => {
                options.valign = Some(VAlign::Middle);
                rest = tail;
            }
            "bottom" => {
                options.valign = Some(VAlign::Bottom);
                rest = tail;
            }
            _ => {}
        }
    }

    if let Some((seg, tail)) = split_segment(rest) {
        if seg == "smart" {
            options.smart = true;
            rest = tail;
        }
    }

    if let Some((seg, tail)) = split_segment(rest) {
        if let Some(list) = seg.strip_prefix("filters:") {
            options.filters = parse_filter_list(list)?;
            rest = tail;
        }
    }

    Ok((options, rest))
}

/// Parse `name(args)[:name(args)]*` into filter specs.
fn parse_filter_list(list: &str) -> Result<Vec<FilterSpec>, ParseError> {
    let mut specs = Vec::new();

    for call in list.split(':') {
        if call.is_empty() {
            continue;
        }
        let caps = filter_call_regex()
            .captures(call)
            .ok_or_else(|| ParseError::BadSegment {
                segment: call.to_string(),
                message: "filters must be written as name(args)".to_string(),
            })?;
        specs.push(FilterSpec {
            name: caps[1].to_string(),
            args: caps[2].to_string(),
        });
    }

    if specs.is_empty() {
        return Err(ParseError::BadSegment {
            segment: format!("filters:{}", list),
            message: "empty filter list".to_string(),
        });
    }

    Ok(specs)
}

/// Decode the raw image remainder once and strip querystring/fragment
/// markers that were part of the signed literal.
fn decode_image_path(raw: &str) -> Result<String, ParseError> {
    if raw.is_empty() {
        return Err(ParseError::MissingImage);
    }

    let decoded = urlencoding::decode(raw).map_err(|_| ParseError::BadSegment {
        segment: raw.to_string(),
        message: "invalid percent-encoding".to_string(),
    })?;

    let canonical = match decoded.find(|c: char| c == '?' || c == '#') {
        Some(idx) => &decoded[..idx],
        None => &decoded[..],
    };

    if canonical.is_empty() {
        return Err(ParseError::MissingImage);
    }

    Ok(canonical.to_string())
}

/// Parse a verified path remainder into a [`RequestSpec`].
///
/// Filter names and arguments are validated against the registry here, so
/// the pipeline never begins I/O for a request it cannot finish.
pub fn parse(remainder: &str, registry: &FilterRegistry) -> Result<RequestSpec, ParseError> {
    let (options, raw_image) = split_options(remainder)?;
    let image_path = decode_image_path(raw_image)?;

    for filter in &options.filters {
        registry
            .validate(&filter.name, &filter.args)
            .map_err(|e| match e {
                FilterError::Unknown { name } => ParseError::UnknownFilter { name },
                FilterError::BadArgs { name, message } => ParseError::BadSegment {
                    segment: name,
                    message,
                },
            })?;
    }

    Ok(RequestSpec {
        auth_token: String::new(),
        crop: options.crop,
        fit_in: options.fit_in,
        target_width: options.width,
        target_height: options.height,
        halign: options.halign.unwrap_or_default(),
        valign: options.valign.unwrap_or_default(),
        smart: options.smart,
        meta: options.meta,
        filters: options.filters,
        image_path,
    })
}

/// Canonical image path of a remainder, without validating filters.
///
/// Used by the signature verifier to locate the crypto-key record for a
/// legacy URL before the full spec exists.
pub fn canonical_image_path(remainder: &str) -> Option<String> {
    let (_, raw_image) = split_options(remainder).ok()?;
    decode_image_path(raw_image).ok()
}
