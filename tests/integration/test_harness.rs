//! Shared fixtures for integration tests
//!
//! Builds a temporary image root with synthesized fixtures and a context
//! wired to the file loader, so tests exercise the real pipeline without
//! any network or external process.

use std::io::Cursor;
use std::sync::Arc;

use image::codecs::gif::GifEncoder;
use image::{ColorType, DynamicImage, Frame};
use tempfile::TempDir;

use washi::config::Config;
use washi::context::Context;
use washi::modules;

/// Flags a test scenario can toggle on its context.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scenario {
    pub allow_unsafe_url: bool,
    pub allow_old_urls: bool,
    pub stores_crypto_key: bool,
    pub auto_webp: bool,
    pub memory_storage: bool,
    pub memory_result_storage: bool,
    pub blocked_pattern: Option<&'static str>,
}

impl Scenario {
    pub fn unsafe_urls() -> Self {
        Self {
            allow_unsafe_url: true,
            ..Default::default()
        }
    }
}

pub const SECURITY_KEY: &str = "ACME-SEC";

/// Build a context over a fresh fixture directory.
///
/// The returned TempDir must stay alive for the duration of the test.
pub fn build_context(scenario: Scenario) -> (TempDir, Arc<Context>) {
    let dir = tempfile::tempdir().expect("fixture dir");
    write_fixtures(&dir);

    let blocked = match scenario.blocked_pattern {
        Some(pattern) => format!("blocked_paths: [\"{}\"]", pattern),
        None => "blocked_paths: []".to_string(),
    };

    let yaml = format!(
        r#"
security_key: "{key}"
allow_unsafe_url: {unsafe_urls}
allow_old_urls: {old_urls}
stores_crypto_key_for_each_image: {stores_key}
auto_webp: {auto_webp}
{blocked}
loader:
  kind: file
  file_root: {root}
storage:
  kind: {storage}
result_storage:
  kind: {results}
"#,
        key = SECURITY_KEY,
        unsafe_urls = scenario.allow_unsafe_url,
        old_urls = scenario.allow_old_urls,
        stores_key = scenario.stores_crypto_key,
        auto_webp = scenario.auto_webp,
        root = dir.path().display(),
        storage = if scenario.memory_storage {
            "memory"
        } else {
            "noop"
        },
        results = if scenario.memory_result_storage {
            "memory"
        } else {
            "noop"
        },
    );

    let config = Config::from_yaml(&yaml).expect("scenario config");
    let ctx = modules::build_context(&config).expect("scenario context");
    (dir, ctx)
}

pub fn checkerboard(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(image::RgbaImage::from_fn(width, height, |x, y| {
        if (x / 4 + y / 4) % 2 == 0 {
            image::Rgba([220, 40, 40, 255])
        } else {
            image::Rgba([40, 40, 220, 255])
        }
    }))
}

fn jpeg_bytes(img: &DynamicImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, image::ImageFormat::Jpeg)
        .expect("jpeg fixture");
    buffer.into_inner()
}

fn write_fixtures(dir: &TempDir) {
    let root = dir.path();

    let default_image = checkerboard(64, 48);
    std::fs::write(root.join("image.jpg"), jpeg_bytes(&default_image)).unwrap();
    std::fs::write(root.join("image"), jpeg_bytes(&default_image)).unwrap();
    std::fs::write(root.join("image space.jpg"), jpeg_bytes(&default_image)).unwrap();
    std::fs::write(root.join("alabama1_ap620é.jpg"), jpeg_bytes(&default_image)).unwrap();

    // Wide source for crop-then-derive scenarios
    std::fs::write(
        root.join("hidrocarbonetos_9.jpg"),
        jpeg_bytes(&checkerboard(200, 100)),
    )
    .unwrap();

    // Monochrome JPEG
    let gray = image::GrayImage::from_fn(32, 32, |x, y| image::Luma([((x * 5 + y * 3) % 255) as u8]));
    std::fs::write(
        root.join("wellsford.jpg"),
        jpeg_bytes(&DynamicImage::ImageLuma8(gray)),
    )
    .unwrap();

    // Static WebP
    let rgba = default_image.to_rgba8();
    let webp_bytes = webp::Encoder::from_rgba(rgba.as_raw(), 64, 48)
        .encode(80.0)
        .to_vec();
    std::fs::write(root.join("image.webp"), webp_bytes).unwrap();

    // Two-frame animated GIF
    let mut gif = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut gif);
        let frame_a = Frame::new(image::RgbaImage::from_pixel(
            16,
            16,
            image::Rgba([255, 0, 0, 255]),
        ));
        let frame_b = Frame::new(image::RgbaImage::from_pixel(
            16,
            16,
            image::Rgba([0, 255, 0, 255]),
        ));
        encoder.encode_frames(vec![frame_a, frame_b]).unwrap();
    }
    std::fs::write(root.join("animated_image.gif"), gif).unwrap();

    // Static single-frame GIF
    let mut static_gif = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut static_gif);
        let rgba = image::RgbaImage::from_pixel(16, 16, image::Rgba([128, 128, 0, 255]));
        encoder
            .encode(rgba.as_raw(), 16, 16, ColorType::Rgba8)
            .unwrap();
    }
    std::fs::write(root.join("static_image.gif"), static_gif).unwrap();

    // Not an image at all
    std::fs::write(root.join("image_invalid.jpg"), b"corrupted nonsense").unwrap();
}

/// Sign a path remainder with the harness security key.
pub fn signed_path(remainder: &str) -> String {
    format!(
        "{}/{}",
        washi::signing::sign(remainder, SECURITY_KEY.as_bytes()),
        remainder
    )
}
