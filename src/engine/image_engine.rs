//! Default engine backed by the `image` crate
//!
//! Decoding goes through `image` with format guessing from magic bytes,
//! which copes with the awkward real-world JPEG variants (monochrome,
//! non-standard quantization tables, CMYK) without special-casing.
//! Resampling uses `fast_image_resize` with a Lanczos3 filter; lossy WebP
//! output uses the `webp` crate since the `image` codec only writes
//! lossless WebP.
//!
//! Animation: GIF sources are probed for a second frame with a block walk
//! over the container structure (no LZW decode), WebP sources for an ANIM
//! chunk. Animated handles expose their first frame to the transform
//! pipeline; re-encoding whole animations is out of this engine's scope
//! and the orchestrator passes eligible animations through untouched.

use std::io::Cursor;
use std::num::NonZeroU32;

use fast_image_resize::{FilterType, Image, PixelType, ResizeAlg, Resizer};
use image::io::Reader as ImageReader;
use image::{ColorType, DynamicImage, GenericImageView};

use super::{CropBox, Engine, EngineError, ImageHandle, OutputFormat, SourceFormat};

/// Largest dimension libwebp-compatible encoders accept.
const WEBP_MAX_DIMENSION: u32 = 16383;

pub struct ImageCrateEngine;

impl Engine for ImageCrateEngine {
    fn decode(&self, buffer: &[u8]) -> Result<Box<dyn ImageHandle>, EngineError> {
        let reader = ImageReader::new(Cursor::new(buffer))
            .with_guessed_format()
            .map_err(|e| EngineError::invalid_image(e.to_string()))?;

        let format = match reader.format() {
            Some(image::ImageFormat::Jpeg) => SourceFormat::Jpeg,
            Some(image::ImageFormat::Png) => SourceFormat::Png,
            Some(image::ImageFormat::Gif) => SourceFormat::Gif,
            Some(image::ImageFormat::WebP) => SourceFormat::WebP,
            Some(other) => {
                return Err(EngineError::UnsupportedFormat {
                    format: format!("{:?}", other).to_lowercase(),
                })
            }
            None => return Err(EngineError::invalid_image("unrecognized magic bytes")),
        };

        let animated = match format {
            SourceFormat::Gif => gif_has_multiple_frames(buffer),
            SourceFormat::WebP => webp_has_animation(buffer),
            _ => false,
        };

        let image = reader
            .decode()
            .map_err(|e| EngineError::invalid_image(e.to_string()))?;

        Ok(Box::new(ImageCrateHandle {
            image,
            format,
            animated,
        }))
    }
}

pub struct ImageCrateHandle {
    image: DynamicImage,
    format: SourceFormat,
    animated: bool,
}

impl ImageCrateHandle {
    #[cfg(test)]
    pub fn from_parts(image: DynamicImage, format: SourceFormat, animated: bool) -> Self {
        Self {
            image,
            format,
            animated,
        }
    }
}

impl ImageHandle for ImageCrateHandle {
    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn is_animated(&self) -> bool {
        self.animated
    }

    fn source_format(&self) -> SourceFormat {
        self.format
    }

    fn crop(&mut self, area: CropBox) {
        let (width, height) = self.image.dimensions();
        let area = area.clamped_to(width, height);
        if area.width() == 0 || area.height() == 0 {
            return;
        }
        self.image = self
            .image
            .crop_imm(area.left, area.top, area.width(), area.height());
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), EngineError> {
        let (src_w, src_h) = self.image.dimensions();
        if (src_w, src_h) == (width, height) {
            return Ok(());
        }
        self.image = resample(&self.image, width, height)?;
        Ok(())
    }

    fn flip_horizontal(&mut self) {
        self.image = self.image.fliph();
    }

    fn flip_vertical(&mut self) {
        self.image = self.image.flipv();
    }

    fn brighten(&mut self, amount: i32) {
        self.image = self.image.brighten(amount);
    }

    fn adjust_contrast(&mut self, amount: f32) {
        self.image = self.image.adjust_contrast(amount);
    }

    fn grayscale(&mut self) {
        self.image = self.image.grayscale();
    }

    fn blur(&mut self, sigma: f32) {
        self.image = self.image.blur(sigma);
    }

    fn sharpen(&mut self, sigma: f32) {
        self.image = self.image.unsharpen(sigma, 1);
    }

    fn rotate(&mut self, degrees: u16) {
        self.image = match degrees % 360 {
            90 => self.image.rotate90(),
            180 => self.image.rotate180(),
            270 => self.image.rotate270(),
            _ => return,
        };
    }

    fn fill(&mut self, color: [u8; 4], pad_to: Option<(u32, u32)>) {
        let rgba = self.image.to_rgba8();
        let (width, height) = rgba.dimensions();

        let (canvas_w, canvas_h) = match pad_to {
            Some((w, h)) if w >= width && h >= height => (w, h),
            _ => (width, height),
        };

        let mut canvas = image::RgbaImage::from_pixel(canvas_w, canvas_h, image::Rgba(color));
        let offset_x = (canvas_w - width) / 2;
        let offset_y = (canvas_h - height) / 2;

        // Composite source over the background, honoring source alpha
        for (x, y, pixel) in rgba.enumerate_pixels() {
            let alpha = pixel[3] as u32;
            if alpha == 0 {
                continue;
            }
            let dest = canvas.get_pixel_mut(x + offset_x, y + offset_y);
            for channel in 0..3 {
                let src = pixel[channel] as u32;
                let bg = dest[channel] as u32;
                dest[channel] = ((src * alpha + bg * (255 - alpha)) / 255) as u8;
            }
            dest[3] = 255;
        }

        self.image = DynamicImage::ImageRgba8(canvas);
    }

    fn encode(&self, format: OutputFormat, quality: u8) -> Result<Vec<u8>, EngineError> {
        let quality = quality.clamp(1, 100);
        match format {
            OutputFormat::Jpeg => encode_jpeg(&self.image, quality),
            OutputFormat::Png => encode_png(&self.image),
            OutputFormat::Gif => encode_gif(&self.image),
            OutputFormat::WebP => encode_webp(&self.image, quality),
        }
    }
}

/// Resample with Lanczos3 in RGBA space.
fn resample(img: &DynamicImage, target_w: u32, target_h: u32) -> Result<DynamicImage, EngineError> {
    let (src_w, src_h) = img.dimensions();

    let src_width =
        NonZeroU32::new(src_w).ok_or_else(|| EngineError::resize_failed("source width is 0"))?;
    let src_height =
        NonZeroU32::new(src_h).ok_or_else(|| EngineError::resize_failed("source height is 0"))?;
    let dst_width =
        NonZeroU32::new(target_w).ok_or_else(|| EngineError::resize_failed("target width is 0"))?;
    let dst_height = NonZeroU32::new(target_h)
        .ok_or_else(|| EngineError::resize_failed("target height is 0"))?;

    let src_image = Image::from_vec_u8(
        src_width,
        src_height,
        img.to_rgba8().into_raw(),
        PixelType::U8x4,
    )
    .map_err(|e| EngineError::resize_failed(format!("source buffer: {:?}", e)))?;

    let mut dst_image = Image::new(dst_width, dst_height, PixelType::U8x4);
    let mut resizer = Resizer::new(ResizeAlg::Convolution(FilterType::Lanczos3));

    resizer
        .resize(&src_image.view(), &mut dst_image.view_mut())
        .map_err(|e| EngineError::resize_failed(format!("{:?}", e)))?;

    let rgba = image::RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| EngineError::resize_failed("output buffer size mismatch"))?;

    Ok(DynamicImage::ImageRgba8(rgba))
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, EngineError> {
    use image::codecs::jpeg::JpegEncoder;
    use image::ImageEncoder as _;

    // JPEG has no alpha channel
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut output = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut output, quality)
        .write_image(rgb.as_raw(), width, height, ColorType::Rgb8)
        .map_err(|e| EngineError::encode_failed("jpeg", e.to_string()))?;

    Ok(output.into_inner())
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, EngineError> {
    use image::codecs::png::PngEncoder;
    use image::ImageEncoder as _;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut output = Cursor::new(Vec::new());
    PngEncoder::new(&mut output)
        .write_image(rgba.as_raw(), width, height, ColorType::Rgba8)
        .map_err(|e| EngineError::encode_failed("png", e.to_string()))?;

    Ok(output.into_inner())
}

fn encode_gif(img: &DynamicImage) -> Result<Vec<u8>, EngineError> {
    use image::codecs::gif::GifEncoder;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut output = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut output);
        encoder
            .encode(rgba.as_raw(), width, height, ColorType::Rgba8)
            .map_err(|e| EngineError::encode_failed("gif", e.to_string()))?;
    }

    Ok(output)
}

fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, EngineError> {
    let (width, height) = img.dimensions();
    if width > WEBP_MAX_DIMENSION || height > WEBP_MAX_DIMENSION {
        return Err(EngineError::EncoderLimit {
            format: "webp".to_string(),
            message: format!(
                "{}x{} exceeds the {} pixel dimension limit",
                width, height, WEBP_MAX_DIMENSION
            ),
        });
    }

    let rgba = img.to_rgba8();
    let encoder = webp::Encoder::from_rgba(rgba.as_raw(), width, height);
    let encoded = encoder.encode(quality as f32);
    Ok(encoded.to_vec())
}

/// Count GIF image descriptors without decoding pixel data.
///
/// Walks the block structure: skips the logical screen descriptor, color
/// tables, extension sub-blocks and image data sub-blocks, stopping as
/// soon as a second image descriptor appears. Malformed structure reports
/// not-animated and leaves failure to the real decoder.
fn gif_has_multiple_frames(buffer: &[u8]) -> bool {
    if buffer.len() < 13 || (&buffer[..6] != b"GIF87a" && &buffer[..6] != b"GIF89a") {
        return false;
    }

    let mut pos = 13usize;

    // Global color table, if flagged
    let packed = buffer[10];
    if packed & 0x80 != 0 {
        let table_len = 3 * (2usize << (packed & 0x07));
        pos += table_len;
    }

    let mut frames = 0u32;

    while pos < buffer.len() {
        match buffer[pos] {
            // Extension block: label + data sub-blocks
            0x21 => {
                pos += 2;
                pos = match skip_sub_blocks(buffer, pos) {
                    Some(p) => p,
                    None => return false,
                };
            }
            // Image descriptor
            0x2C => {
                frames += 1;
                if frames > 1 {
                    return true;
                }
                if pos + 10 > buffer.len() {
                    return false;
                }
                let packed = buffer[pos + 9];
                pos += 10;
                if packed & 0x80 != 0 {
                    pos += 3 * (2usize << (packed & 0x07));
                }
                // LZW minimum code size byte, then data sub-blocks
                pos += 1;
                pos = match skip_sub_blocks(buffer, pos) {
                    Some(p) => p,
                    None => return false,
                };
            }
            // Trailer
            0x3B => break,
            _ => return false,
        }
    }

    false
}

/// Skip a chain of GIF data sub-blocks, returning the position after the
/// terminating zero-length block.
fn skip_sub_blocks(buffer: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        let len = *buffer.get(pos)? as usize;
        pos += 1;
        if len == 0 {
            return Some(pos);
        }
        pos += len;
    }
}

/// Detect the ANIM chunk of an animated WebP container.
fn webp_has_animation(buffer: &[u8]) -> bool {
    if buffer.len() < 16 || &buffer[..4] != b"RIFF" || &buffer[8..12] != b"WEBP" {
        return false;
    }
    // VP8X extended header carries the animation flag
    &buffer[12..16] == b"VP8X" && buffer.len() > 20 && buffer[20] & 0x02 != 0
}
