//! Image reload integration tests.
//!
//! Tests verify:
//! - POST /reload swaps the served image and invalidates cached tiles
//! - The pyramid follows the new image's dimensions
//! - A failed reload keeps the previous image and its cache

use axum::http::StatusCode;
use image::Rgb;

use super::test_utils::{body_json, decode_png, solid_image, TestApp};

const RED: [u8; 3] = [220, 30, 30];
const BLUE: [u8; 3] = [30, 30, 220];

#[tokio::test]
async fn test_reload_swaps_image() {
    let app = TestApp::new(solid_image(200, 200, RED), 256).await;

    let (body, _) = app.tile(0, 0, 0).await;
    assert_eq!(*decode_png(&body).get_pixel(10, 10), Rgb(RED));

    app.loader.set_next(solid_image(200, 200, BLUE));
    let response = app.post("/reload").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["ok"], true);
    assert_eq!(json["generation"], 1);
    assert_eq!(json["width"], 200);

    let (body, hit) = app.tile(0, 0, 0).await;
    assert!(!hit, "reload must invalidate cached tiles");
    assert_eq!(*decode_png(&body).get_pixel(10, 10), Rgb(BLUE));
}

#[tokio::test]
async fn test_reload_clears_cache_directory() {
    let app = TestApp::new(solid_image(600, 600, RED), 256).await;
    app.tile(0, 0, 0).await;
    app.tile(1, 1, 1).await;
    app.tile(2, 2, 0).await;
    assert!(app.cache_root.join("2").join("2_0.png").is_file());

    app.loader.set_next(solid_image(600, 600, BLUE));
    assert_eq!(app.post("/reload").await.status(), StatusCode::OK);

    for zoom in ["0", "1", "2"] {
        assert!(!app.cache_root.join(zoom).exists(), "zoom {} left behind", zoom);
    }
    assert!(app.cache_root.join("tmp").is_dir());

    let info = app.info().await;
    assert_eq!(info["cache"]["tiles"], 0);
}

#[tokio::test]
async fn test_reload_with_larger_image_raises_max_zoom() {
    let app = TestApp::new(solid_image(200, 200, RED), 256).await;
    assert_eq!(app.info().await["max_zoom"], 0);

    // Zoom 2 does not exist yet
    let response = app.get("/tiles/2/0/0.png").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.loader.set_next(solid_image(1000, 700, BLUE));
    let json = body_json(app.post("/reload").await).await;
    assert_eq!(json["max_zoom"], 2);

    let info = app.info().await;
    assert_eq!(info["width"], 1000);
    assert_eq!(info["height"], 700);
    assert_eq!(info["max_zoom"], 2);

    let (body, _) = app.tile(2, 3, 2).await;
    assert_eq!(decode_png(&body).dimensions(), (256, 256));
}

#[tokio::test]
async fn test_failed_reload_keeps_current_image() {
    let app = TestApp::new(solid_image(200, 200, RED), 256).await;
    let (before, _) = app.tile(0, 0, 0).await;

    app.loader.set_missing();
    let response = app.post("/reload").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"], "not_found");

    let (after, hit) = app.tile(0, 0, 0).await;
    assert!(hit, "cache must survive a failed reload");
    assert_eq!(before, after);
    assert_eq!(app.info().await["generation"], 0);
}

#[tokio::test]
async fn test_reload_requires_post() {
    let app = TestApp::new(solid_image(10, 10, RED), 256).await;

    let response = app.get("/reload").await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
