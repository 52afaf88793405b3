//! API integration tests for tile retrieval and error handling.
//!
//! Tests verify:
//! - Tile retrieval at every zoom level
//! - Pixel-exact tiles at max zoom, background outside the image
//! - Error cases (invalid zoom, malformed coordinates)
//! - HTTP response codes and headers
//! - Info and health endpoints

use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use tile_pyramid::tile::{PyramidConfig, TileKey, BACKGROUND};
use tile_pyramid::RouterConfig;

use super::test_utils::{
    body_bytes, body_json, decode_png, gradient_image, header_str, is_valid_png, TestApp,
};

// =============================================================================
// Basic Tile Retrieval
// =============================================================================

#[tokio::test]
async fn test_tile_retrieval_success() {
    let app = TestApp::new(gradient_image(600, 400), 256).await;

    let response = app.get("/tiles/0/0/0.png").await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(header_str(&response, "content-type"), "image/png");
    assert_eq!(
        header_str(&response, "cache-control"),
        "no-cache, no-store, must-revalidate"
    );
    assert_eq!(header_str(&response, "pragma"), "no-cache");
    assert_eq!(header_str(&response, "expires"), "0");
    assert_eq!(header_str(&response, "x-tile-cache-hit"), "false");

    let body = body_bytes(response).await;
    assert!(is_valid_png(&body), "Response should be a valid PNG");
    assert_eq!(decode_png(&body).dimensions(), (256, 256));
}

#[tokio::test]
async fn test_tile_retrieval_without_png_extension() {
    let app = TestApp::new(gradient_image(300, 300), 256).await;

    let response = app.get("/tiles/1/0/0").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(is_valid_png(&body_bytes(response).await));
}

#[tokio::test]
async fn test_every_tile_has_tile_size() {
    let app = TestApp::new(gradient_image(600, 400), 256).await;
    let info = app.info().await;
    assert_eq!(info["max_zoom"], 2);

    for level in info["levels"].as_array().unwrap() {
        let zoom = level["zoom"].as_u64().unwrap() as u32;
        let columns = level["columns"].as_u64().unwrap() as u32;
        let rows = level["rows"].as_u64().unwrap() as u32;

        for x in 0..columns {
            for y in 0..rows {
                let (body, _) = app.tile(zoom, x, y).await;
                assert_eq!(decode_png(&body).dimensions(), (256, 256));
            }
        }
    }
}

#[tokio::test]
async fn test_max_zoom_tile_matches_source_crop() {
    let source = gradient_image(600, 400);
    let app = TestApp::new(source.clone(), 256).await;

    // Zoom 2 is max zoom; tile (1, 1) covers [256, 512) x [256, 512)
    let (body, _) = app.tile(2, 1, 1).await;
    let tile = decode_png(&body);

    for (x, y, pixel) in tile.enumerate_pixels() {
        if 256 + y < 400 {
            assert_eq!(pixel, source.get_pixel(256 + x, 256 + y));
        } else {
            assert_eq!(*pixel, BACKGROUND, "pixel ({}, {}) below the image", x, y);
        }
    }
}

#[tokio::test]
async fn test_tile_outside_image_is_background() {
    let app = TestApp::new(gradient_image(300, 300), 256).await;

    for (z, x, y) in [(1, 7, 0), (1, 0, 9), (0, 3, 3)] {
        let (body, _) = app.tile(z, x, y).await;
        let tile = decode_png(&body);
        assert_eq!(tile.dimensions(), (256, 256));
        assert!(tile.pixels().all(|p| *p == BACKGROUND));
    }
}

#[tokio::test]
async fn test_repeated_requests_are_identical() {
    let app = TestApp::new(gradient_image(700, 500), 256).await;

    let (first, first_hit) = app.tile(1, 1, 0).await;
    let (second, second_hit) = app.tile(1, 1, 0).await;

    assert!(!first_hit);
    assert!(second_hit);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_cache_max_age_header() {
    let config = RouterConfig::new()
        .with_tracing(false)
        .with_cache_max_age(60);
    let app = TestApp::with_config(gradient_image(100, 100), 64, config).await;

    let response = app.get("/tiles/0/0/0.png").await;
    assert_eq!(header_str(&response, "cache-control"), "public, max-age=60");
    assert!(response.headers().get("pragma").is_none());
    assert!(response.headers().get("expires").is_none());
}

// =============================================================================
// Error Handling
// =============================================================================

#[tokio::test]
async fn test_invalid_zoom() {
    let app = TestApp::new(gradient_image(300, 300), 256).await;

    let response = app.get("/tiles/2/0/0.png").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_zoom");
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_malformed_coordinates() {
    let app = TestApp::new(gradient_image(300, 300), 256).await;

    for uri in [
        "/tiles/a/0/0.png",
        "/tiles/0/-1/0.png",
        "/tiles/0/0/abc.png",
        "/tiles/0/0/0.jpg",
    ] {
        let response = app.get(uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);

        let json = body_json(response).await;
        assert_eq!(json["error"], "invalid_coordinate", "{}", uri);
    }
}

#[tokio::test]
async fn test_unknown_route() {
    let app = TestApp::new(gradient_image(10, 10), 256).await;
    let response = app.get("/tiles/0/0").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Info and Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new(gradient_image(10, 10), 256).await;

    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_info_endpoint() {
    let app = TestApp::new(gradient_image(1000, 300), 256).await;
    app.tile(0, 0, 0).await;
    app.tile(0, 0, 0).await;

    let info = app.info().await;
    assert_eq!(info["width"], 1000);
    assert_eq!(info["height"], 300);
    assert_eq!(info["tile_size"], 256);
    assert_eq!(info["max_zoom"], 2);
    assert_eq!(info["generation"], 0);

    let levels = info["levels"].as_array().unwrap();
    assert_eq!(levels.len(), 3);
    assert_eq!(levels[0]["scale"], 4);
    assert_eq!(levels[0]["columns"], 1);
    assert_eq!(levels[2]["scale"], 1);
    assert_eq!(levels[2]["columns"], 4);
    assert_eq!(levels[2]["rows"], 2);

    assert_eq!(info["stats"]["hits"], 1);
    assert_eq!(info["stats"]["misses"], 1);
    assert_eq!(info["stats"]["renders"], 1);
    assert_eq!(info["cache"]["tiles"], 1);
}

#[tokio::test]
async fn test_cors_any_origin() {
    let app = TestApp::new(gradient_image(10, 10), 256).await;

    let request = Request::builder()
        .uri("/health")
        .header("origin", "https://viewer.example")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(header_str(&response, "access-control-allow-origin"), "*");
}

// =============================================================================
// Pyramid Geometry
// =============================================================================

#[test]
fn test_large_square_image_geometry() {
    let pyramid = PyramidConfig::new(8192, 8192, 256).unwrap();
    assert_eq!(pyramid.max_zoom(), 5);

    let top = pyramid.tile_rect(&TileKey::new(5, 0, 0)).unwrap();
    assert_eq!((top.x0, top.y0, top.x1, top.y1), (0, 0, 256, 256));

    let root = pyramid.tile_rect(&TileKey::new(0, 0, 0)).unwrap();
    assert_eq!((root.x0, root.y0, root.x1, root.y1), (0, 0, 8192, 8192));
    assert_eq!(pyramid.source_tile_pixels(0).unwrap(), 8192);
}
