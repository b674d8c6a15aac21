//! End-to-end pipeline scenarios over the file loader

use washi::handler::handle;

use super::test_harness::{build_context, signed_path, Scenario};

fn is_jpeg(body: &[u8]) -> bool {
    body.starts_with(&[0xFF, 0xD8])
}

#[tokio::test]
async fn test_can_get_image() {
    let (_dir, ctx) = build_context(Scenario::unsafe_urls());
    let response = handle(ctx, "unsafe/smart/image.jpg", None).await;
    assert_eq!(response.status, 200);
    assert!(is_jpeg(&response.body));
    assert_eq!(response.header("Content-Type"), Some("image/jpeg"));
}

#[tokio::test]
async fn test_can_get_image_without_extension() {
    let (_dir, ctx) = build_context(Scenario::unsafe_urls());
    let response = handle(ctx, "unsafe/smart/image", None).await;
    assert_eq!(response.status, 200);
    assert!(is_jpeg(&response.body));
}

#[tokio::test]
async fn test_unknown_image_returns_not_found() {
    let (_dir, ctx) = build_context(Scenario::unsafe_urls());
    let response = handle(ctx, "unsafe/smart/imag", None).await;
    assert_eq!(response.status, 404);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_can_get_unicode_image() {
    let (_dir, ctx) = build_context(Scenario::unsafe_urls());
    let response = handle(ctx, "unsafe/alabama1_ap620%C3%A9.jpg", None).await;
    assert_eq!(response.status, 200);
    assert!(is_jpeg(&response.body));
}

#[tokio::test]
async fn test_image_with_spaces_on_url() {
    let (_dir, ctx) = build_context(Scenario::unsafe_urls());
    let response = handle(ctx, "unsafe/image%20space.jpg", None).await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_can_get_signed_image() {
    let (_dir, ctx) = build_context(Scenario::default());
    let response = handle(ctx, &signed_path("smart/image.jpg"), None).await;
    assert_eq!(response.status, 200);
    assert!(is_jpeg(&response.body));
}

#[tokio::test]
async fn test_signed_urls_work_even_with_unsafe_enabled() {
    let (_dir, ctx) = build_context(Scenario::unsafe_urls());
    let response = handle(ctx, &signed_path("smart/image.jpg"), None).await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_url_without_unsafe_or_signature_fails() {
    let (_dir, ctx) = build_context(Scenario::unsafe_urls());
    let response = handle(ctx, "alabama1_ap620%C3%A9.jpg", None).await;
    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn test_url_without_image_fails() {
    let (_dir, ctx) = build_context(Scenario::unsafe_urls());
    let response = handle(ctx, "unsafe/", None).await;
    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn test_unsafe_url_fails_when_disallowed() {
    let (_dir, ctx) = build_context(Scenario::default());
    let response = handle(ctx, "unsafe/smart/image.jpg", None).await;
    assert_eq!(response.status, 400);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_tampered_signature_fails() {
    let (_dir, ctx) = build_context(Scenario::default());
    let mut path = signed_path("smart/image.jpg");
    // Flip a character of the token
    path.replace_range(0..1, if path.starts_with('A') { "B" } else { "A" });
    let response = handle(ctx, &path, None).await;
    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn test_signature_over_different_options_fails() {
    let (_dir, ctx) = build_context(Scenario::default());
    let token = signed_path("smart/image.jpg");
    let token = token.split('/').next().unwrap();
    let response = handle(ctx, &format!("{}/300x200/image.jpg", token), None).await;
    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn test_can_get_image_with_fill_filter() {
    let (_dir, ctx) = build_context(Scenario::default());
    let response = handle(ctx, &signed_path("filters:fill(blue)/image.jpg"), None).await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_unknown_filter_is_rejected() {
    let (_dir, ctx) = build_context(Scenario::unsafe_urls());
    let response = handle(ctx, "unsafe/filters:sepia(80)/image.jpg", None).await;
    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn test_invalid_image_returns_bad_request() {
    let (_dir, ctx) = build_context(Scenario::unsafe_urls());
    let response = handle(ctx, "unsafe/image_invalid.jpg", None).await;
    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn test_can_read_monochromatic_jpeg() {
    let (_dir, ctx) = build_context(Scenario::unsafe_urls());
    let response = handle(ctx, "unsafe/wellsford.jpg", None).await;
    assert_eq!(response.status, 200);
    assert!(is_jpeg(&response.body));
}

#[tokio::test]
async fn test_crop_with_width_and_no_height() {
    let (_dir, ctx) = build_context(Scenario::unsafe_urls());
    let response = handle(ctx, "unsafe/0x0:168x59/40x/hidrocarbonetos_9.jpg", None).await;
    assert_eq!(response.status, 200);
    assert!(is_jpeg(&response.body));

    let decoded = image::load_from_memory(&response.body).unwrap();
    // 168x59 crop scaled to width 40 derives height 14
    assert_eq!(decoded.width(), 40);
    assert_eq!(decoded.height(), 14);
}

#[tokio::test]
async fn test_resize_with_zero_width_preserves_aspect() {
    let (_dir, ctx) = build_context(Scenario::unsafe_urls());
    let response = handle(ctx, "unsafe/0x24/image.jpg", None).await;
    assert_eq!(response.status, 200);

    let decoded = image::load_from_memory(&response.body).unwrap();
    // 64x48 source at height 24 derives width 32
    assert_eq!((decoded.width(), decoded.height()), (32, 24));
}

#[tokio::test]
async fn test_negative_width_mirrors_image() {
    let (_dir, ctx) = build_context(Scenario::unsafe_urls());
    let straight = handle(ctx.clone(), "unsafe/64x48/image.jpg", None).await;
    let mirrored = handle(ctx, "unsafe/-64x48/image.jpg", None).await;
    assert_eq!(straight.status, 200);
    assert_eq!(mirrored.status, 200);

    let straight = image::load_from_memory(&straight.body).unwrap().to_rgba8();
    let mirrored = image::load_from_memory(&mirrored.body).unwrap().to_rgba8();
    assert_eq!(straight.dimensions(), mirrored.dimensions());

    // Mirroring moves the distinctly colored left edge to the right edge.
    // JPEG is lossy, so compare channel dominance rather than exact bytes.
    let left = straight.get_pixel(1, 24);
    let right = mirrored.get_pixel(62, 24);
    assert!((left[0] > left[2]) == (right[0] > right[2]));
}

#[tokio::test]
async fn test_exact_resize_dimensions() {
    let (_dir, ctx) = build_context(Scenario::unsafe_urls());
    let response = handle(ctx, "unsafe/20x30/image.jpg", None).await;
    assert_eq!(response.status, 200);

    let decoded = image::load_from_memory(&response.body).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (20, 30));
}

#[tokio::test]
async fn test_fit_in_never_exceeds_box() {
    let (_dir, ctx) = build_context(Scenario::unsafe_urls());
    let response = handle(ctx, "unsafe/fit-in/32x32/image.jpg", None).await;
    assert_eq!(response.status, 200);

    let decoded = image::load_from_memory(&response.body).unwrap();
    // 64x48 fit into 32x32 scales to 32x24
    assert_eq!((decoded.width(), decoded.height()), (32, 24));
}

#[tokio::test]
async fn test_format_filter_converts_output() {
    let (_dir, ctx) = build_context(Scenario::unsafe_urls());
    let response = handle(ctx, "unsafe/filters:format(png)/image.jpg", None).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("Content-Type"), Some("image/png"));
    assert_eq!(&response.body[..4], &[0x89, 0x50, 0x4E, 0x47]);
}

#[tokio::test]
async fn test_meta_request_returns_json() {
    let (_dir, ctx) = build_context(Scenario::unsafe_urls());
    let response = handle(ctx, "unsafe/meta/20x30/image.jpg", None).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("Content-Type"), Some("application/json"));

    let meta: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(meta["image_path"], "image.jpg");
    assert_eq!(meta["source_width"], 64);
    assert_eq!(meta["source_height"], 48);
    assert_eq!(meta["target_width"], 20);
    assert_eq!(meta["target_height"], 30);
    assert_eq!(meta["output_format"], "jpeg");
}

#[tokio::test]
async fn test_blocked_path_returns_forbidden() {
    let (_dir, ctx) = build_context(Scenario {
        blocked_pattern: Some("image.*"),
        ..Scenario::unsafe_urls()
    });

    let response = handle(ctx.clone(), "unsafe/image.jpg", None).await;
    assert_eq!(response.status, 403);

    let response = handle(ctx, "unsafe/wellsford.jpg", None).await;
    assert_eq!(response.status, 200);
}
