//! Tile service layer.
//!
//! This module turns the source image into a pyramid of fixed-size PNG tiles
//! and caches them on disk.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              Tile Service               │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │ DiskTileCache│  │  TileRenderer   │  │
//! │  │ ({z}/{x}_{y} │  │  (crop, pad,    │  │
//! │  │   .png)      │  │   Lanczos3)     │  │
//! │  └──────────────┘  └────────┬────────┘  │
//! │                             │           │
//! │                    ┌────────▼────────┐  │
//! │                    │ PngTileEncoder  │  │
//! │                    └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │     ImageRegistry  +  PyramidConfig     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`PyramidConfig`]: Zoom levels and tile-to-source rectangle mapping
//! - [`TileRenderer`]: Rasterizes a source rectangle into a tile
//! - [`PngTileEncoder`]: Deterministic PNG encoding
//! - [`DiskTileCache`]: Persistent tile store with atomic writes
//! - [`TileService`]: Main entry point, with single-flight rendering and
//!   cache invalidation on image swaps
//!
//! # Example
//!
//! ```
//! use tile_pyramid::tile::{PyramidConfig, TileKey};
//!
//! let pyramid = PyramidConfig::new(8192, 8192, 256).unwrap();
//! assert_eq!(pyramid.max_zoom(), 5);
//!
//! // At zoom 0 one tile covers the whole image
//! let rect = pyramid.tile_rect(&TileKey::new(0, 0, 0)).unwrap();
//! assert_eq!((rect.x1, rect.y1), (8192, 8192));
//! ```

mod cache;
mod encoder;
mod pyramid;
mod render;
mod service;

pub use cache::{CacheUsage, DiskTileCache};
pub use encoder::{PngCompression, PngTileEncoder, TILE_CONTENT_TYPE, TILE_EXTENSION};
pub use pyramid::{
    max_zoom, Overlap, PixelRegion, PyramidConfig, SourceRect, TileKey, DEFAULT_TILE_SIZE,
};
pub use render::{TileRenderer, BACKGROUND};
pub use service::{TileRequest, TileResponse, TileService, TileStatsSnapshot};
