//! Result storage write-through and hit behavior

use std::time::Duration;

use washi::handler::handle;

use super::test_harness::{build_context, Scenario};

fn cached_scenario() -> Scenario {
    Scenario {
        memory_result_storage: true,
        ..Scenario::unsafe_urls()
    }
}

/// The write-through is spawned; give it a moment to land.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_hit_returns_byte_identical_output() {
    let (_dir, ctx) = build_context(cached_scenario());

    let first = handle(ctx.clone(), "unsafe/20x30/image.jpg", None).await;
    assert_eq!(first.status, 200);
    settle().await;

    let second = handle(ctx, "unsafe/20x30/image.jpg", None).await;
    assert_eq!(second.status, 200);
    assert_eq!(first.body, second.body);
    assert_eq!(second.header("Content-Type"), Some("image/jpeg"));
}

#[tokio::test]
async fn test_hit_skips_loader_entirely() {
    let (dir, ctx) = build_context(cached_scenario());

    let first = handle(ctx.clone(), "unsafe/20x30/image.jpg", None).await;
    assert_eq!(first.status, 200);
    settle().await;

    // Remove the source; a cache hit must still answer.
    std::fs::remove_file(dir.path().join("image.jpg")).unwrap();

    let second = handle(ctx.clone(), "unsafe/20x30/image.jpg", None).await;
    assert_eq!(second.status, 200);
    assert_eq!(second.body, first.body);

    // A different transform of the removed source misses and 404s.
    let miss = handle(ctx, "unsafe/10x10/image.jpg", None).await;
    assert_eq!(miss.status, 404);
}

#[tokio::test]
async fn test_distinct_options_are_distinct_entries() {
    let (_dir, ctx) = build_context(cached_scenario());

    let small = handle(ctx.clone(), "unsafe/10x10/image.jpg", None).await;
    let large = handle(ctx.clone(), "unsafe/40x40/image.jpg", None).await;
    settle().await;

    let small_again = handle(ctx.clone(), "unsafe/10x10/image.jpg", None).await;
    let large_again = handle(ctx, "unsafe/40x40/image.jpg", None).await;

    assert_eq!(small.body, small_again.body);
    assert_eq!(large.body, large_again.body);
    assert_ne!(small.body, large.body);
}

#[tokio::test]
async fn test_webp_capable_clients_get_their_own_entry() {
    let (_dir, ctx) = build_context(Scenario {
        auto_webp: true,
        ..cached_scenario()
    });

    let webp = handle(
        ctx.clone(),
        "unsafe/20x30/image.jpg",
        Some("image/webp,*/*;q=0.8"),
    )
    .await;
    settle().await;

    let plain = handle(ctx.clone(), "unsafe/20x30/image.jpg", None).await;
    settle().await;

    assert_eq!(webp.header("Content-Type"), Some("image/webp"));
    assert_eq!(plain.header("Content-Type"), Some("image/jpeg"));
    assert_ne!(webp.body, plain.body);

    // Repeat both; each capability class sees its own bytes.
    let webp_again = handle(
        ctx.clone(),
        "unsafe/20x30/image.jpg",
        Some("image/webp,*/*;q=0.8"),
    )
    .await;
    let plain_again = handle(ctx, "unsafe/20x30/image.jpg", None).await;
    assert_eq!(webp.body, webp_again.body);
    assert_eq!(plain.body, plain_again.body);
}

#[tokio::test]
async fn test_errors_are_not_cached() {
    let (dir, ctx) = build_context(cached_scenario());

    let missing = handle(ctx.clone(), "unsafe/late.jpg", None).await;
    assert_eq!(missing.status, 404);
    settle().await;

    // The image shows up afterwards; the earlier 404 must not stick.
    std::fs::copy(dir.path().join("image.jpg"), dir.path().join("late.jpg")).unwrap();
    let found = handle(ctx, "unsafe/late.jpg", None).await;
    assert_eq!(found.status, 200);
}
