//! Test utilities for integration tests.
//!
//! This module provides an in-memory image loader, synthetic test images and
//! helpers for driving the router.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use image::{ImageFormat, Rgb, RgbImage};
use tempfile::TempDir;
use tower::ServiceExt;

use tile_pyramid::error::ImageError;
use tile_pyramid::source::{ImageLoader, ImageRegistry, SourceImage};
use tile_pyramid::tile::{DiskTileCache, TileService};
use tile_pyramid::{create_router, RouterConfig};

// =============================================================================
// Switchable Loader
// =============================================================================

/// Loader returning whatever image the test last provided.
///
/// Clones share the same slot, so a test can keep a handle and change the
/// image the server picks up on its next reload.
#[derive(Clone)]
pub struct SwitchableLoader {
    next: Arc<Mutex<Option<RgbImage>>>,
}

impl SwitchableLoader {
    pub fn new(image: RgbImage) -> Self {
        Self {
            next: Arc::new(Mutex::new(Some(image))),
        }
    }

    /// Image returned by the next load.
    pub fn set_next(&self, image: RgbImage) {
        *self.next.lock().unwrap() = Some(image);
    }

    /// Make the next load fail with `ImageError::NotFound`.
    pub fn set_missing(&self) {
        *self.next.lock().unwrap() = None;
    }
}

#[async_trait]
impl ImageLoader for SwitchableLoader {
    async fn load(&self) -> Result<SourceImage, ImageError> {
        let next = self.next.lock().unwrap().clone();
        match next {
            Some(pixels) => SourceImage::new(pixels),
            None => Err(ImageError::NotFound("no image staged".to_string())),
        }
    }
}

// =============================================================================
// Test Images
// =============================================================================

/// An image where every pixel is distinguishable from its neighbours.
pub fn gradient_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x / 256 + y / 256) * 40 + 30) as u8])
    })
}

pub fn solid_image(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb(color))
}

/// Check if data is a PNG stream.
pub fn is_valid_png(data: &[u8]) -> bool {
    data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
}

pub fn decode_png(data: &[u8]) -> RgbImage {
    image::load_from_memory_with_format(data, ImageFormat::Png)
        .unwrap()
        .into_rgb8()
}

// =============================================================================
// Test Application
// =============================================================================

/// A router over a fresh cache directory and a switchable image.
pub struct TestApp {
    pub router: Router,
    pub loader: SwitchableLoader,
    pub cache_root: PathBuf,
    pub tile_size: u32,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new(image: RgbImage, tile_size: u32) -> Self {
        Self::with_config(image, tile_size, RouterConfig::new().with_tracing(false)).await
    }

    pub async fn with_config(image: RgbImage, tile_size: u32, config: RouterConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let cache_root = dir.path().join("tiles");

        let loader = SwitchableLoader::new(image);
        let registry = ImageRegistry::open(loader.clone(), tile_size).await.unwrap();
        let cache = DiskTileCache::open(&cache_root).await.unwrap();
        let service = TileService::new(registry, cache);

        Self {
            router: create_router(service, config),
            loader,
            cache_root,
            tile_size,
            _dir: dir,
        }
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Method::GET, uri).await
    }

    pub async fn post(&self, uri: &str) -> Response<Body> {
        self.send(Method::POST, uri).await
    }

    async fn send(&self, method: Method, uri: &str) -> Response<Body> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Fetch a tile, asserting success; returns (body, cache hit).
    pub async fn tile(&self, z: u32, x: u32, y: u32) -> (Vec<u8>, bool) {
        let response = self.get(&format!("/tiles/{}/{}/{}.png", z, x, y)).await;
        assert_eq!(response.status(), 200, "tile {}/{}/{}", z, x, y);

        let hit = header_str(&response, "x-tile-cache-hit") == "true";
        (body_bytes(response).await, hit)
    }

    pub async fn info(&self) -> serde_json::Value {
        let response = self.get("/info").await;
        assert_eq!(response.status(), 200);
        body_json(response).await
    }
}

pub fn header_str<'a>(response: &'a Response<Body>, name: &str) -> &'a str {
    response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("missing header {}", name))
        .to_str()
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
