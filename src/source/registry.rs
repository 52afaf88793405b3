//! Holder for the current source image.
//!
//! The registry provides:
//! - A read-mostly snapshot of the active image and its pyramid layout
//! - Atomic replacement: readers see either the old or the new snapshot, never
//!   a mix of the two
//!
//! The registry does not touch the tile cache, so swapping is crate-private:
//! images are replaced through [`crate::tile::TileService`], which serializes
//! swaps against in-flight tile requests and clears cached tiles.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use super::loader::ImageLoader;
use super::raster::SourceImage;
use crate::error::ImageError;
use crate::tile::PyramidConfig;

// =============================================================================
// ImageSnapshot
// =============================================================================

/// The image a request works against, with its derived pyramid.
///
/// A snapshot stays valid for as long as it is held, even if the registry
/// swaps in a newer image meanwhile.
#[derive(Debug)]
pub struct ImageSnapshot {
    image: Arc<SourceImage>,
    pyramid: PyramidConfig,
    generation: u64,
}

impl ImageSnapshot {
    fn new(image: SourceImage, tile_size: u32, generation: u64) -> Result<Self, ImageError> {
        let pyramid = PyramidConfig::new(image.width(), image.height(), tile_size)?;
        Ok(Self {
            image: Arc::new(image),
            pyramid,
            generation,
        })
    }

    pub fn image(&self) -> &Arc<SourceImage> {
        &self.image
    }

    pub fn pyramid(&self) -> &PyramidConfig {
        &self.pyramid
    }

    /// Number of swaps that preceded this snapshot (0 for the first image).
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

// =============================================================================
// ImageRegistry
// =============================================================================

/// Owns the active [`SourceImage`] and swaps it atomically.
pub struct ImageRegistry<L: ImageLoader> {
    /// Source of fresh images on reload
    loader: L,

    /// Tile edge length used to derive every snapshot's pyramid
    tile_size: u32,

    /// The active snapshot
    current: RwLock<Arc<ImageSnapshot>>,
}

impl<L: ImageLoader> ImageRegistry<L> {
    /// Load the initial image through `loader`.
    ///
    /// # Errors
    ///
    /// Fails if the loader fails or the image cannot be tiled with `tile_size`.
    pub async fn open(loader: L, tile_size: u32) -> Result<Self, ImageError> {
        let image = loader.load().await?;
        Self::with_image(loader, image, tile_size)
    }

    /// Create a registry around an already-decoded image.
    pub fn with_image(loader: L, image: SourceImage, tile_size: u32) -> Result<Self, ImageError> {
        let snapshot = ImageSnapshot::new(image, tile_size, 0)?;
        log_snapshot("Image loaded", &snapshot);

        Ok(Self {
            loader,
            tile_size,
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Get the active snapshot.
    pub async fn current(&self) -> Arc<ImageSnapshot> {
        self.current.read().await.clone()
    }

    /// Swap in a new image.
    ///
    /// The pyramid is derived before the swap, so an image that cannot be
    /// tiled leaves the current snapshot untouched. Callers must clear the
    /// tile cache before serving from the new snapshot.
    pub(crate) async fn replace(&self, image: SourceImage) -> Result<Arc<ImageSnapshot>, ImageError> {
        let mut current = self.current.write().await;

        let snapshot = Arc::new(ImageSnapshot::new(
            image,
            self.tile_size,
            current.generation + 1,
        )?);
        *current = snapshot.clone();

        log_snapshot("Image replaced", &snapshot);
        Ok(snapshot)
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }
}

fn log_snapshot(message: &str, snapshot: &ImageSnapshot) {
    let origin = snapshot
        .image
        .origin()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<memory>".to_string());

    info!(
        width = snapshot.image.width(),
        height = snapshot.image.height(),
        max_zoom = snapshot.pyramid.max_zoom(),
        generation = snapshot.generation,
        origin = %origin,
        "{}",
        message
    );
}

// =============================================================================
// Tests
// =============================================================================
