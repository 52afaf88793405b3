//! Source image layer.
//!
//! This module owns the base raster that every tile is cut from.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Tile Service               │
//! └────────────────────┬────────────────────┘
//!                      │ current() / replace() / reload()
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             ImageRegistry               │
//! │   (Arc<ImageSnapshot>, atomic swap)     │
//! └────────────────────┬────────────────────┘
//!                      │ load()
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          ImageLoader Trait              │
//! │   LocalImageLoader (data directory)     │
//! └─────────────────────────────────────────┘
//! ```

mod loader;
mod raster;
mod registry;

pub use loader::{
    decode_image_file, find_latest_image, is_supported_image, ImageLoader, LocalImageLoader,
    SUPPORTED_EXTENSIONS,
};
pub use raster::SourceImage;
pub use registry::{ImageRegistry, ImageSnapshot};
