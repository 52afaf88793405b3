//! Tile rasterization.
//!
//! Turns a source rectangle into a `tile_size` x `tile_size` RGB raster:
//!
//! 1. **No overlap**: the tile is uniformly [`BACKGROUND`].
//! 2. **Partial overlap**: the in-bounds pixels are copied into a
//!    background-filled working buffer the size of the rectangle, at their
//!    offset within the rectangle.
//! 3. **Full overlap**: the rectangle is copied directly.
//!
//! The working buffer is then resampled down to the tile size with a
//! Lanczos3 filter. At scale 1 the buffer already has the tile size and is
//! returned untouched, so max-zoom tiles are exact crops.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use super::pyramid::{Overlap, SourceRect};
use crate::error::TileError;
use crate::source::SourceImage;

/// Fill color for tile areas outside the source image.
pub const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

/// Renders source rectangles into fixed-size tiles.
#[derive(Debug, Clone, Copy)]
pub struct TileRenderer {
    tile_size: u32,
    filter: FilterType,
}

impl TileRenderer {
    /// Create a renderer producing `tile_size` x `tile_size` tiles.
    pub fn new(tile_size: u32) -> Self {
        Self {
            tile_size,
            filter: FilterType::Lanczos3,
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// A tile filled entirely with [`BACKGROUND`].
    pub fn blank(&self) -> RgbImage {
        RgbImage::from_pixel(self.tile_size, self.tile_size, BACKGROUND)
    }

    /// Render `rect` of `image` into a tile.
    ///
    /// # Errors
    ///
    /// Returns [`TileError::Render`] if the rectangle is not a square that can
    /// be buffered in memory. Rectangles produced by
    /// [`crate::tile::PyramidConfig`] always satisfy this.
    pub fn render(&self, image: &SourceImage, rect: &SourceRect) -> Result<RgbImage, TileError> {
        let span = buffer_span(rect)?;

        let buffer = match rect.overlap(image.width(), image.height()) {
            Overlap::None => return Ok(self.blank()),
            Overlap::Full(region) => {
                image.read_region(region.x, region.y, region.width, region.height)
            }
            Overlap::Partial(region) => {
                let mut buffer = RgbImage::from_pixel(span, span, BACKGROUND);
                let crop = image.read_region(region.x, region.y, region.width, region.height);
                imageops::replace(
                    &mut buffer,
                    &crop,
                    i64::from(region.offset_x),
                    i64::from(region.offset_y),
                );
                buffer
            }
        };

        Ok(self.resample(buffer))
    }

    fn resample(&self, buffer: RgbImage) -> RgbImage {
        if buffer.dimensions() == (self.tile_size, self.tile_size) {
            return buffer;
        }
        imageops::resize(&buffer, self.tile_size, self.tile_size, self.filter)
    }
}

/// Edge length of the working buffer for `rect`.
fn buffer_span(rect: &SourceRect) -> Result<u32, TileError> {
    if rect.width() != rect.height() || rect.width() == 0 {
        return Err(TileError::Render {
            message: format!(
                "source rectangle must be a non-empty square, got {}x{}",
                rect.width(),
                rect.height()
            ),
        });
    }

    u32::try_from(rect.width()).map_err(|_| TileError::Render {
        message: format!("source rectangle too large: {} pixels", rect.width()),
    })
}

// =============================================================================
// Tests
// =============================================================================
