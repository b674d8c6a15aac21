//! Key rotation through stored crypto-key records

use washi::handler::handle;
use washi::signing;

use super::test_harness::{build_context, Scenario};

fn rotation_scenario() -> Scenario {
    Scenario {
        allow_old_urls: true,
        stores_crypto_key: true,
        memory_storage: true,
        ..Default::default()
    }
}

const OLD_KEY: &str = "MYKEY";

fn old_signed(remainder: &str) -> String {
    format!("{}/{}", signing::sign(remainder, OLD_KEY.as_bytes()), remainder)
}

#[tokio::test]
async fn test_stored_key_verifies_legacy_url() {
    let (_dir, ctx) = build_context(rotation_scenario());
    // The image was first served while OLD_KEY was the signing key
    ctx.storage
        .put_crypto_key("image.jpg", OLD_KEY)
        .await
        .unwrap();

    let response = handle(ctx, &old_signed("smart/image.jpg"), None).await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_stored_key_with_querystring_suffix() {
    let (_dir, ctx) = build_context(rotation_scenario());
    ctx.storage
        .put_crypto_key("image.jpg", OLD_KEY)
        .await
        .unwrap();

    // The signature covers the literal remainder including the encoded
    // querystring; the key record lives under the canonical path.
    let response = handle(ctx, &old_signed("smart/image.jpg%3Fts%3D1"), None).await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_stored_key_with_fragment_suffix() {
    let (_dir, ctx) = build_context(rotation_scenario());
    ctx.storage
        .put_crypto_key("image.jpg", OLD_KEY)
        .await
        .unwrap();

    let response = handle(ctx, &old_signed("smart/image.jpg%23something"), None).await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_legacy_url_fails_without_stored_key() {
    let (_dir, ctx) = build_context(rotation_scenario());

    let response = handle(ctx, &old_signed("smart/image.jpg"), None).await;
    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn test_legacy_url_fails_when_old_urls_disallowed() {
    let (_dir, ctx) = build_context(Scenario {
        allow_old_urls: false,
        ..rotation_scenario()
    });
    ctx.storage
        .put_crypto_key("image.jpg", OLD_KEY)
        .await
        .unwrap();

    let response = handle(ctx, &old_signed("smart/image.jpg"), None).await;
    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn test_current_key_still_verifies() {
    let (_dir, ctx) = build_context(rotation_scenario());
    let response = handle(
        ctx,
        &super::test_harness::signed_path("smart/image.jpg"),
        None,
    )
    .await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_first_fetch_records_current_key() {
    let (_dir, ctx) = build_context(rotation_scenario());

    let response = handle(
        ctx.clone(),
        &super::test_harness::signed_path("image.jpg"),
        None,
    )
    .await;
    assert_eq!(response.status, 200);

    // The write-through is spawned; give it a moment to land.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let recorded = ctx.storage.get_crypto_key("image.jpg").await.unwrap();
    assert_eq!(recorded.as_deref(), Some(super::test_harness::SECURITY_KEY));
}
