//! Image engine abstraction
//!
//! An [`Engine`] turns raw source bytes into an [`ImageHandle`]; the handle
//! carries every operation the pipeline needs: geometric transforms, the
//! pixel operations used by filters, cheap property queries (dimensions,
//! animation, source format) and encoding to an output format.
//!
//! Engines are pluggable: the default implementation is backed by the
//! `image` crate (see [`image_engine`]), and loaders may hand back a
//! pre-bound handle to skip a redundant decode.

pub mod geometry;
pub mod image_engine;

/// Engine operation failures
#[derive(Debug, Clone)]
pub enum EngineError {
    /// Input is not a decodable image (truncated, wrong magic, garbage)
    InvalidImage { message: String },
    /// Input decodes but the container format is not supported
    UnsupportedFormat { format: String },
    /// Resampling failed
    ResizeFailed { message: String },
    /// Encoding to the output format failed
    EncodeFailed { format: String, message: String },
    /// The target format cannot represent this image (hard encoder limit)
    EncoderLimit { format: String, message: String },
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidImage { message } => write!(f, "Invalid image: {}", message),
            EngineError::UnsupportedFormat { format } => {
                write!(f, "Unsupported image format: {}", format)
            }
            EngineError::ResizeFailed { message } => write!(f, "Resize failed: {}", message),
            EngineError::EncodeFailed { format, message } => {
                write!(f, "Failed to encode to {}: {}", format, message)
            }
            EngineError::EncoderLimit { format, message } => {
                write!(f, "Encoder limit for {}: {}", format, message)
            }
        }
    }
}

impl std::error::Error for EngineError {}

impl EngineError {
    pub fn invalid_image(message: impl Into<String>) -> Self {
        EngineError::InvalidImage {
            message: message.into(),
        }
    }

    pub fn resize_failed(message: impl Into<String>) -> Self {
        EngineError::ResizeFailed {
            message: message.into(),
        }
    }

    pub fn encode_failed(format: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }
}

/// Container format of the fetched source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl SourceFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }
}

/// Output format chosen by a filter or by content negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::WebP => "webp",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "gif" => Ok(OutputFormat::Gif),
            "webp" => Ok(OutputFormat::WebP),
            other => Err(format!("unknown format: {}", other)),
        }
    }
}

impl From<SourceFormat> for OutputFormat {
    fn from(source: SourceFormat) -> Self {
        match source {
            SourceFormat::Jpeg => OutputFormat::Jpeg,
            SourceFormat::Png => OutputFormat::Png,
            SourceFormat::Gif => OutputFormat::Gif,
            SourceFormat::WebP => OutputFormat::WebP,
        }
    }
}

/// Crop window in source pixel space.
///
/// `left`/`top` is the inclusive top-left corner, `right`/`bottom` the
/// exclusive bottom-right corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropBox {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Clamp the window to an image of the given dimensions.
    pub fn clamped_to(&self, width: u32, height: u32) -> CropBox {
        CropBox {
            left: self.left.min(width),
            top: self.top.min(height),
            right: self.right.min(width),
            bottom: self.bottom.min(height),
        }
    }
}

/// Pluggable decoder: raw bytes in, image handle out.
pub trait Engine: Send + Sync {
    fn decode(&self, buffer: &[u8]) -> Result<Box<dyn ImageHandle>, EngineError>;
}

/// A decoded image plus every operation the pipeline applies to it.
pub trait ImageHandle: Send {
    /// Current dimensions (width, height)
    fn dimensions(&self) -> (u32, u32);

    /// Total pixel count of the current image
    fn pixel_count(&self) -> u64 {
        let (w, h) = self.dimensions();
        w as u64 * h as u64
    }

    /// Whether the source is an animated sequence
    fn is_animated(&self) -> bool;

    /// Container format the source bytes arrived in
    fn source_format(&self) -> SourceFormat;

    /// Crop to a window, clamped to the image bounds. Applied before resize.
    fn crop(&mut self, area: CropBox);

    /// Resample to exact target dimensions.
    fn resize(&mut self, width: u32, height: u32) -> Result<(), EngineError>;

    fn flip_horizontal(&mut self);
    fn flip_vertical(&mut self);

    // Pixel operations used by the filter pipeline
    fn brighten(&mut self, amount: i32);
    fn adjust_contrast(&mut self, amount: f32);
    fn grayscale(&mut self);
    fn blur(&mut self, sigma: f32);
    fn sharpen(&mut self, sigma: f32);

    /// Rotate clockwise; `degrees` is one of 90, 180, 270.
    fn rotate(&mut self, degrees: u16);

    /// Flatten transparency onto `color`, optionally padding the canvas to
    /// `pad_to` with the image centered.
    fn fill(&mut self, color: [u8; 4], pad_to: Option<(u32, u32)>);

    /// Encode to the target format.
    fn encode(&self, format: OutputFormat, quality: u8) -> Result<Vec<u8>, EngineError>;
}

/// Identify a container format from magic bytes.
///
/// Used to restore the Content-Type of result-cache hits without decoding.
pub fn sniff_format(buffer: &[u8]) -> Option<SourceFormat> {
    if buffer.len() < 12 {
        return None;
    }
    if buffer.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(SourceFormat::Jpeg);
    }
    if buffer.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some(SourceFormat::Png);
    }
    if buffer.starts_with(b"GIF87a") || buffer.starts_with(b"GIF89a") {
        return Some(SourceFormat::Gif);
    }
    if buffer.starts_with(b"RIFF") && &buffer[8..12] == b"WEBP" {
        return Some(SourceFormat::WebP);
    }
    None
}
