//! # Tile Pyramid
//!
//! Serves a single large raster image as a pyramid of fixed-size PNG tiles,
//! the way web map viewers expect them.
//!
//! Tiles are rendered on first request, cached on disk and served from the
//! cache afterwards. Replacing the source image invalidates every cached tile.
//!
//! ## Features
//!
//! - **Power-of-two pyramid**: zoom 0 fits the whole image in one tile, the
//!   max zoom shows source pixels 1:1
//! - **On-demand rendering**: crop, pad with background and Lanczos3
//!   downsampling, off the async runtime
//! - **Persistent cache**: `{z}/{x}_{y}.png` files written atomically
//! - **Single-flight**: concurrent requests for one missing tile render it once
//! - **Hot reload**: swap the image and clear the cache without restarting
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`source`] - Source image loading and the swappable image holder
//! - [`tile`] - Pyramid geometry, rendering, encoding, caching and the tile service
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//! - [`error`] - Error types shared across layers
//!
//! ## Example
//!
//! ```rust,no_run
//! use tile_pyramid::{create_router, DiskTileCache, ImageRegistry, LocalImageLoader, RouterConfig, TileService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ImageRegistry::open(LocalImageLoader::new("data"), 256).await?;
//!     let cache = DiskTileCache::open("tiles").await?;
//!     let service = TileService::new(registry, cache);
//!
//!     let router = create_router(service, RouterConfig::new());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod server;
pub mod source;
pub mod tile;

// Re-export commonly used types
pub use config::Config;
pub use error::{CacheError, ImageError, PyramidError, TileError};
pub use server::{create_router, AppState, ErrorResponse, RouterConfig};
pub use source::{ImageLoader, ImageRegistry, ImageSnapshot, LocalImageLoader, SourceImage};
pub use tile::{
    max_zoom, DiskTileCache, PngCompression, PngTileEncoder, PyramidConfig, SourceRect, TileKey,
    TileRenderer, TileRequest, TileResponse, TileService,
};
