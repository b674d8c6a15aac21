//! Filter pipeline
//!
//! Filters are named, parameterized post-processing steps applied in the
//! exact order the URL lists them, strictly after crop/resize and before
//! format negotiation. The registry is closed: every name maps to a parser
//! that validates its argument string up front, so unknown filters and
//! malformed arguments fail the request at parse time, before any image
//! I/O happens.

use std::collections::HashMap;

use crate::engine::{EngineError, ImageHandle, OutputFormat};

pub mod standard;

/// Filter construction failure, reported at URL parse time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// No filter registered under this name
    Unknown { name: String },
    /// The argument string does not parse for this filter
    BadArgs { name: String, message: String },
}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterError::Unknown { name } => write!(f, "Unknown filter: {}", name),
            FilterError::BadArgs { name, message } => {
                write!(f, "Invalid arguments for filter '{}': {}", name, message)
            }
        }
    }
}

impl std::error::Error for FilterError {}

/// Output parameters a filter may override.
///
/// Format and quality overrides take precedence over automatic content
/// negotiation. `requested` carries the resolved target dimensions so
/// padding filters can fill fit-in letterboxing.
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    /// Explicit output format chosen by a `format(...)` filter
    pub format: Option<OutputFormat>,
    /// Quality chosen by a `quality(...)` filter (1-100)
    pub quality: Option<u8>,
    /// Resolved target dimensions, set by the geometry pass
    pub requested: Option<(u32, u32)>,
}

/// A single validated filter instance
pub trait Filter: Send + Sync {
    /// Apply the filter to the image, possibly adjusting output options.
    fn apply(
        &self,
        image: &mut Box<dyn ImageHandle>,
        output: &mut OutputOptions,
    ) -> Result<(), EngineError>;
}

type FilterParser = fn(&str) -> Result<Box<dyn Filter>, String>;

/// Closed name-to-parser registry, resolved once at startup.
pub struct FilterRegistry {
    parsers: HashMap<&'static str, FilterParser>,
}

impl FilterRegistry {
    /// Registry with the standard filter set.
    pub fn standard() -> Self {
        let mut parsers: HashMap<&'static str, FilterParser> = HashMap::new();
        parsers.insert("brightness", standard::parse_brightness);
        parsers.insert("contrast", standard::parse_contrast);
        parsers.insert("grayscale", standard::parse_grayscale);
        parsers.insert("blur", standard::parse_blur);
        parsers.insert("sharpen", standard::parse_sharpen);
        parsers.insert("rotate", standard::parse_rotate);
        parsers.insert("fill", standard::parse_fill);
        parsers.insert("format", standard::parse_format);
        parsers.insert("quality", standard::parse_quality);
        Self { parsers }
    }

    /// Build a filter instance from its name and raw argument string.
    pub fn build(&self, name: &str, args: &str) -> Result<Box<dyn Filter>, FilterError> {
        let parser = self.parsers.get(name).ok_or_else(|| FilterError::Unknown {
            name: name.to_string(),
        })?;
        parser(args).map_err(|message| FilterError::BadArgs {
            name: name.to_string(),
            message,
        })
    }

    /// Validate a filter reference without keeping the instance.
    pub fn validate(&self, name: &str, args: &str) -> Result<(), FilterError> {
        self.build(name, args).map(|_| ())
    }

    /// Whether a name is registered at all.
    pub fn contains(&self, name: &str) -> bool {
        self.parsers.contains_key(name)
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
