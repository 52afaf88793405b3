//! HTTP request handlers for the tile pyramid API.
//!
//! This module contains the Axum handlers for serving tiles, image metadata,
//! reloads and health checks.
//!
//! # Endpoints
//!
//! - `GET /tiles/{z}/{x}/{y}.png` - Serve a tile
//! - `GET /info` - Image dimensions, pyramid levels and counters
//! - `POST /reload` - Reload the source image and clear cached tiles
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::cache_control_value;
use crate::error::{ImageError, TileError};
use crate::source::ImageLoader;
use crate::tile::{
    CacheUsage, TileRequest, TileService, TileStatsSnapshot, TILE_CONTENT_TYPE, TILE_EXTENSION,
};

/// Response header telling whether a tile came from the cache.
pub const CACHE_HIT_HEADER: &str = "X-Tile-Cache-Hit";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the tile service.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<L: ImageLoader> {
    /// The tile service for processing tile requests
    pub tile_service: Arc<TileService<L>>,

    /// Cache-Control max-age in seconds (0 = no-cache)
    pub cache_max_age: u32,
}

impl<L: ImageLoader> AppState<L> {
    /// Create a new application state that tells clients not to cache tiles.
    pub fn new(tile_service: TileService<L>) -> Self {
        Self::with_cache_max_age(tile_service, 0)
    }

    /// Create a new application state with custom cache max-age.
    pub fn with_cache_max_age(tile_service: TileService<L>, cache_max_age: u32) -> Self {
        Self {
            tile_service: Arc::new(tile_service),
            cache_max_age,
        }
    }
}

impl<L: ImageLoader> Clone for AppState<L> {
    fn clone(&self) -> Self {
        Self {
            tile_service: Arc::clone(&self.tile_service),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Path parameters for tile requests.
///
/// Extracted from: `/tiles/{z}/{x}/{filename}` where filename is `{y}` or
/// `{y}.png`. Components are kept as strings so that malformed values map to
/// a 404 like any other missing tile.
#[derive(Debug, Deserialize)]
pub struct TilePathParams {
    /// Zoom level
    pub z: String,

    /// Tile X coordinate
    pub x: String,

    /// Tile Y coordinate with optional .png extension (e.g., "0" or "0.png")
    pub filename: String,
}

impl TilePathParams {
    /// Parse the path into a tile request.
    pub fn to_request(&self) -> Result<TileRequest, TileError> {
        let y = self
            .filename
            .strip_suffix(TILE_EXTENSION)
            .and_then(|rest| rest.strip_suffix('.'))
            .unwrap_or(&self.filename);

        Ok(TileRequest::new(
            parse_coordinate(&self.z)?,
            parse_coordinate(&self.x)?,
            parse_coordinate(y)?,
        ))
    }
}

fn parse_coordinate(value: &str) -> Result<u32, TileError> {
    // Only plain decimal digits: no sign, no whitespace
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TileError::InvalidCoordinate {
            value: value.to_string(),
        });
    }
    value.parse().map_err(|_| TileError::InvalidCoordinate {
        value: value.to_string(),
    })
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "invalid_zoom", "render_error")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

/// Geometry of one zoom level.
#[derive(Debug, Serialize)]
pub struct LevelResponse {
    /// Zoom level (0 = whole image in one tile)
    pub zoom: u32,

    /// Source pixels per output pixel along each axis
    pub scale: u64,

    /// Tiles needed to cover the image horizontally
    pub columns: u64,

    /// Tiles needed to cover the image vertically
    pub rows: u64,
}

/// Response from the info endpoint.
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    /// Width of the source image in pixels
    pub width: u32,

    /// Height of the source image in pixels
    pub height: u32,

    /// Tile edge length in pixels
    pub tile_size: u32,

    /// Highest zoom level (scale 1)
    pub max_zoom: u32,

    /// Number of image swaps since startup
    pub generation: u64,

    /// File the image was loaded from, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Per-level geometry, from zoom 0 to max zoom
    pub levels: Vec<LevelResponse>,

    /// Request and render counters
    pub stats: TileStatsSnapshot,

    /// Tiles currently on disk (absent if the cache could not be scanned)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheUsage>,
}

/// Response from the reload endpoint.
#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub ok: bool,
    pub message: String,
    pub width: u32,
    pub height: u32,
    pub max_zoom: u32,
    pub generation: u64,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert TileError to HTTP response.
///
/// This implementation logs errors appropriately based on their severity:
/// - 404s are logged at DEBUG level (clients probing past max zoom are common)
/// - 5xx errors are logged at ERROR level (server errors)
impl IntoResponse for TileError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            // 404 Not Found
            TileError::InvalidZoom { .. } => (StatusCode::NOT_FOUND, "invalid_zoom"),
            TileError::InvalidCoordinate { .. } => (StatusCode::NOT_FOUND, "invalid_coordinate"),
            TileError::Image(ImageError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),

            // 500 Internal Server Error - loading and processing errors
            TileError::Image(ImageError::Decode { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "decode_error")
            }
            TileError::Image(_) => (StatusCode::INTERNAL_SERVER_ERROR, "image_error"),
            TileError::Render { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "render_error"),
            TileError::Encode { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "encode_error"),
            TileError::Cache(_) => (StatusCode::INTERNAL_SERVER_ERROR, "cache_error"),
        };
        let message = self.to_string();

        // Log errors based on severity
        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);

        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Serve one tile.
///
/// # Response Headers
///
/// - `Content-Type: image/png`
/// - `Cache-Control`: no-cache by default, `public, max-age=N` when configured
/// - `Pragma: no-cache` and `Expires: 0` alongside the no-cache default
/// - `X-Tile-Cache-Hit`: whether the tile was already on disk
///
/// # Errors
///
/// - 404 for a zoom above the max zoom or a non-numeric coordinate
/// - 500 if rendering or encoding fails
pub async fn tile_handler<L: ImageLoader>(
    State(state): State<AppState<L>>,
    Path(params): Path<TilePathParams>,
) -> Result<Response, TileError> {
    let request = params.to_request()?;

    let response = state.tile_service.get_tile(request).await?;

    let headers = [
        (header::CONTENT_TYPE, TILE_CONTENT_TYPE.to_string()),
        (header::CACHE_CONTROL, cache_control_value(state.cache_max_age)),
    ];
    let no_cache = (state.cache_max_age == 0)
        .then_some([(header::PRAGMA, "no-cache"), (header::EXPIRES, "0")]);

    Ok((
        StatusCode::OK,
        headers,
        no_cache,
        [(CACHE_HIT_HEADER, response.cache_hit.to_string())],
        response.data,
    )
        .into_response())
}

/// Report the current image and pyramid layout.
pub async fn info_handler<L: ImageLoader>(State(state): State<AppState<L>>) -> Json<InfoResponse> {
    let service = &state.tile_service;
    let snapshot = service.snapshot().await;
    let pyramid = snapshot.pyramid();

    // Zoom levels of the snapshot's own pyramid are always valid
    let levels = (0..=pyramid.max_zoom())
        .filter_map(|zoom| {
            let scale = pyramid.scale(zoom).ok()?;
            let (columns, rows) = pyramid.tiles_at(zoom).ok()?;
            Some(LevelResponse {
                zoom,
                scale,
                columns,
                rows,
            })
        })
        .collect();

    let cache = match service.cache_usage().await {
        Ok(usage) => Some(usage),
        Err(e) => {
            warn!(error = %e, "Failed to scan tile cache");
            None
        }
    };

    Json(InfoResponse {
        width: pyramid.width(),
        height: pyramid.height(),
        tile_size: pyramid.tile_size(),
        max_zoom: pyramid.max_zoom(),
        generation: snapshot.generation(),
        source: snapshot
            .image()
            .origin()
            .map(|path| path.display().to_string()),
        levels,
        stats: service.stats(),
        cache,
    })
}

/// Reload the source image and drop every cached tile.
///
/// On failure the previous image keeps being served.
pub async fn reload_handler<L: ImageLoader>(
    State(state): State<AppState<L>>,
) -> Result<Json<ReloadResponse>, TileError> {
    let snapshot = state.tile_service.reload().await?;
    let pyramid = snapshot.pyramid();

    info!(
        width = pyramid.width(),
        height = pyramid.height(),
        generation = snapshot.generation(),
        "Image reloaded via API"
    );

    Ok(Json(ReloadResponse {
        ok: true,
        message: format!(
            "Reloaded {}x{} image, tile cache cleared",
            pyramid.width(),
            pyramid.height()
        ),
        width: pyramid.width(),
        height: pyramid.height(),
        max_zoom: pyramid.max_zoom(),
        generation: snapshot.generation(),
    }))
}

/// Health check.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
