//! Auto-WebP negotiation end to end

use washi::handler::handle;

use super::test_harness::{build_context, Scenario};

const WEBP_ACCEPT: Option<&str> = Some("image/webp,*/*;q=0.8");

fn webp_scenario() -> Scenario {
    Scenario {
        auto_webp: true,
        ..Scenario::unsafe_urls()
    }
}

fn is_webp(body: &[u8]) -> bool {
    body.len() > 12 && &body[..4] == b"RIFF" && &body[8..12] == b"WEBP"
}

#[tokio::test]
async fn test_can_auto_convert_jpeg() {
    let (_dir, ctx) = build_context(webp_scenario());
    let response = handle(ctx, "unsafe/image.jpg", WEBP_ACCEPT).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("Vary"), Some("Accept"));
    assert_eq!(response.header("Content-Type"), Some("image/webp"));
    assert!(is_webp(&response.body));
}

#[tokio::test]
async fn test_should_not_convert_if_already_webp() {
    let (_dir, ctx) = build_context(webp_scenario());
    let response = handle(ctx, "unsafe/image.webp", WEBP_ACCEPT).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("Vary"), None);
    assert!(is_webp(&response.body));
}

#[tokio::test]
async fn test_should_not_convert_animated_gifs() {
    let (_dir, ctx) = build_context(webp_scenario());
    let response = handle(ctx, "unsafe/animated_image.gif", WEBP_ACCEPT).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("Vary"), None);
    assert_eq!(response.header("Content-Type"), Some("image/gif"));
    assert!(response.body.starts_with(b"GIF8"));
}

#[tokio::test]
async fn test_untouched_animation_passes_source_bytes_through() {
    let (dir, ctx) = build_context(webp_scenario());
    let original = std::fs::read(dir.path().join("animated_image.gif")).unwrap();

    let response = handle(ctx, "unsafe/animated_image.gif", WEBP_ACCEPT).await;
    assert_eq!(response.body.as_ref(), original.as_slice());
}

#[tokio::test]
async fn test_static_gif_does_convert() {
    let (_dir, ctx) = build_context(webp_scenario());
    let response = handle(ctx, "unsafe/static_image.gif", WEBP_ACCEPT).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("Vary"), Some("Accept"));
    assert!(is_webp(&response.body));
}

#[tokio::test]
async fn test_client_without_webp_keeps_source_format_but_varies() {
    let (_dir, ctx) = build_context(webp_scenario());
    let response = handle(ctx, "unsafe/image.jpg", Some("image/png,*/*;q=0.5")).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("Vary"), Some("Accept"));
    assert_eq!(response.header("Content-Type"), Some("image/jpeg"));
}

#[tokio::test]
async fn test_negotiation_disabled_never_varies() {
    let (_dir, ctx) = build_context(Scenario::unsafe_urls());
    let response = handle(ctx, "unsafe/image.jpg", WEBP_ACCEPT).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("Vary"), None);
    assert_eq!(response.header("Content-Type"), Some("image/jpeg"));
}

#[tokio::test]
async fn test_converts_image_with_crop_and_derived_height() {
    let (_dir, ctx) = build_context(webp_scenario());
    let response = handle(ctx, "unsafe/0x0:168x59/40x/hidrocarbonetos_9.jpg", WEBP_ACCEPT).await;

    assert_eq!(response.status, 200);
    assert!(is_webp(&response.body));
}

#[tokio::test]
async fn test_converts_monochromatic_jpeg() {
    let (_dir, ctx) = build_context(webp_scenario());
    let response = handle(ctx, "unsafe/wellsford.jpg", WEBP_ACCEPT).await;

    assert_eq!(response.status, 200);
    assert!(is_webp(&response.body));
}

#[tokio::test]
async fn test_explicit_format_filter_beats_negotiation() {
    let (_dir, ctx) = build_context(webp_scenario());
    let response = handle(ctx, "unsafe/filters:format(png)/image.jpg", WEBP_ACCEPT).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("Vary"), None);
    assert_eq!(response.header("Content-Type"), Some("image/png"));
    assert_eq!(&response.body[..4], &[0x89, 0x50, 0x4E, 0x47]);
}
