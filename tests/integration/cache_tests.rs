//! Tile cache integration tests.
//!
//! These tests verify:
//! - Tiles are persisted under {root}/{z}/{x}_{y}.png
//! - No temporary files are left behind
//! - Concurrent requests for one tile render it once
//! - A broken cache directory degrades to uncached serving

use std::fs;

use axum::body::Body;
use axum::http::Request;
use tower::ServiceExt;

use super::test_utils::{body_bytes, gradient_image, TestApp};

#[tokio::test]
async fn test_tile_persisted_on_disk() {
    let app = TestApp::new(gradient_image(600, 400), 256).await;

    let (body, _) = app.tile(1, 1, 0).await;

    let path = app.cache_root.join("1").join("1_0.png");
    assert!(path.is_file(), "expected {} to exist", path.display());
    assert_eq!(fs::read(&path).unwrap(), body);
}

#[tokio::test]
async fn test_no_temporary_files_left() {
    let app = TestApp::new(gradient_image(600, 400), 256).await;

    for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
        app.tile(1, x, y).await;
    }

    let tmp = app.cache_root.join("tmp");
    assert!(tmp.is_dir());
    assert_eq!(fs::read_dir(&tmp).unwrap().count(), 0);
}

#[tokio::test]
async fn test_cached_file_is_served() {
    let app = TestApp::new(gradient_image(300, 300), 256).await;
    app.tile(0, 0, 0).await;

    // The served bytes come from the file, not from memory
    let path = app.cache_root.join("0").join("0_0.png");
    fs::write(&path, b"stand-in bytes").unwrap();

    let (body, hit) = app.tile(0, 0, 0).await;
    assert!(hit);
    assert_eq!(body, b"stand-in bytes");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_render_once() {
    let app = TestApp::new(gradient_image(2000, 2000), 256).await;

    let mut handles = Vec::new();
    for _ in 0..12 {
        let router = app.router.clone();
        handles.push(tokio::spawn(async move {
            let request = Request::builder()
                .uri("/tiles/0/0/0.png")
                .body(Body::empty())
                .unwrap();
            let response = router.oneshot(request).await.unwrap();
            assert_eq!(response.status(), 200);
            body_bytes(response).await
        }));
    }

    let mut bodies = Vec::new();
    for handle in handles {
        bodies.push(handle.await.unwrap());
    }
    assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));

    let info = app.info().await;
    assert_eq!(info["stats"]["renders"], 1);
}

#[tokio::test]
async fn test_unwritable_cache_still_serves_tiles() {
    let app = TestApp::new(gradient_image(300, 300), 256).await;

    // Replace the cache root with a plain file
    fs::remove_dir_all(&app.cache_root).unwrap();
    fs::write(&app.cache_root, b"not a directory").unwrap();

    let (first, first_hit) = app.tile(1, 0, 0).await;
    let (second, second_hit) = app.tile(1, 0, 0).await;

    assert!(!first_hit);
    assert!(!second_hit);
    assert_eq!(first, second);

    let info = app.info().await;
    assert_eq!(info["stats"]["cache_write_errors"], 2);
    assert_eq!(info["stats"]["renders"], 2);
    assert!(info.get("cache").is_none());
}
