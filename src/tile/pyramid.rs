//! Pyramid geometry: zoom levels and tile-to-source mapping.
//!
//! The pyramid has `max_zoom + 1` levels. At zoom `z` one output pixel covers
//! `2^(max_zoom - z)` source pixels along each axis, so a tile at `z` covers a
//! square of `tile_size * 2^(max_zoom - z)` source pixels. At `max_zoom` the
//! scale is 1 and tiles are exact crops of the source image.
//!
//! ```text
//!   z = 0            z = 1                 z = max_zoom
//! ┌───────┐      ┌───┬───┐            ┌─┬─┬─┬─┬─┬─┬─┬─┐
//! │       │      │0,0│1,0│            ├─┼─┼─┼─┼─┼─┼─┼─┤
//! │  0,0  │      ├───┼───┤    ...     ├─┼─┼─┼─┼─┼─┼─┼─┤
//! │       │      │0,1│1,1│            ├─┼─┼─┼─┼─┼─┼─┼─┤
//! └───────┘      └───┴───┘            └─┴─┴─┴─┴─┴─┴─┴─┘
//! ```
//!
//! Everything in this module is pure arithmetic; no pixel data is touched.

use std::fmt;

use crate::error::{PyramidError, TileError};

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

// =============================================================================
// Zoom Level Calculator
// =============================================================================

/// Compute the maximum zoom level for an image.
///
/// Returns the smallest `n >= 0` such that `tile_size * 2^n >= max(width, height)`,
/// i.e. `max(0, ceil(log2(max(width, height) / tile_size)))` computed without
/// floating point. Images that fit in a single tile (including 1x1) get 0.
///
/// A `tile_size` of 0 is treated as 1; use [`PyramidConfig::new`] to reject it.
pub fn max_zoom(width: u32, height: u32, tile_size: u32) -> u32 {
    let max_dim = u64::from(width.max(height));
    let tile_size = u64::from(tile_size.max(1));

    let mut zoom = 0;
    while (tile_size << zoom) < max_dim {
        zoom += 1;
    }
    zoom
}

// =============================================================================
// Tile Key
// =============================================================================

/// Address of one tile in the pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Zoom level (0 = whole image in one tile)
    pub zoom: u32,

    /// Column, 0-indexed from the left
    pub x: u32,

    /// Row, 0-indexed from the top
    pub y: u32,
}

impl TileKey {
    pub fn new(zoom: u32, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

// =============================================================================
// Source Rectangle
// =============================================================================

/// Half-open rectangle `[x0, x1) x [y0, y1)` in source-image pixels.
///
/// Coordinates are signed: a rectangle may extend past any edge of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRect {
    pub x0: i64,
    pub y0: i64,
    pub x1: i64,
    pub y1: i64,
}

/// In-bounds pixel region of a [`SourceRect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRegion {
    /// Left edge in the source image
    pub x: u32,
    /// Top edge in the source image
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Horizontal offset of the region inside the rectangle
    pub offset_x: u32,
    /// Vertical offset of the region inside the rectangle
    pub offset_y: u32,
}

/// How a rectangle overlaps an image of a given size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlap {
    /// Rectangle lies entirely outside the image
    None,
    /// Rectangle straddles at least one image edge
    Partial(PixelRegion),
    /// Rectangle lies entirely inside the image
    Full(PixelRegion),
}

impl SourceRect {
    pub fn width(&self) -> u64 {
        self.x1.saturating_sub(self.x0).max(0) as u64
    }

    pub fn height(&self) -> u64 {
        self.y1.saturating_sub(self.y0).max(0) as u64
    }

    /// Classify this rectangle against an image of `width` x `height` pixels.
    pub fn overlap(&self, width: u32, height: u32) -> Overlap {
        let (w, h) = (i64::from(width), i64::from(height));

        let left = self.x0.max(0);
        let top = self.y0.max(0);
        let right = self.x1.min(w);
        let bottom = self.y1.min(h);

        if right <= left || bottom <= top {
            return Overlap::None;
        }

        // All four values are within [0, u32::MAX] after clamping.
        let region = PixelRegion {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
            offset_x: (left - self.x0) as u32,
            offset_y: (top - self.y0) as u32,
        };

        if left == self.x0 && top == self.y0 && right == self.x1 && bottom == self.y1 {
            Overlap::Full(region)
        } else {
            Overlap::Partial(region)
        }
    }
}

// =============================================================================
// Pyramid Configuration
// =============================================================================

/// Pyramid layout for one source image.
///
/// `max_zoom` is always derived from the image dimensions and tile size; it
/// cannot be set independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyramidConfig {
    width: u32,
    height: u32,
    tile_size: u32,
    max_zoom: u32,
}

impl PyramidConfig {
    /// Derive the pyramid for an image.
    ///
    /// # Errors
    ///
    /// - [`PyramidError::InvalidTileSize`] if `tile_size` is 0
    /// - [`PyramidError::EmptyImage`] if either dimension is 0
    pub fn new(width: u32, height: u32, tile_size: u32) -> Result<Self, PyramidError> {
        if tile_size == 0 {
            return Err(PyramidError::InvalidTileSize(tile_size));
        }
        if width == 0 || height == 0 {
            return Err(PyramidError::EmptyImage { width, height });
        }

        Ok(Self {
            width,
            height,
            tile_size,
            max_zoom: max_zoom(width, height, tile_size),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn max_zoom(&self) -> u32 {
        self.max_zoom
    }

    /// Reject zoom levels outside `[0, max_zoom]`.
    pub fn check_zoom(&self, zoom: u32) -> Result<(), TileError> {
        if zoom > self.max_zoom {
            return Err(TileError::InvalidZoom {
                zoom,
                max_zoom: self.max_zoom,
            });
        }
        Ok(())
    }

    /// Source pixels per output pixel at `zoom`: `2^(max_zoom - zoom)`.
    pub fn scale(&self, zoom: u32) -> Result<u64, TileError> {
        self.check_zoom(zoom)?;
        Ok(1u64 << (self.max_zoom - zoom))
    }

    /// Edge length of the source square covered by one tile at `zoom`.
    pub fn source_tile_pixels(&self, zoom: u32) -> Result<u64, TileError> {
        Ok(u64::from(self.tile_size) * self.scale(zoom)?)
    }

    /// Map a tile address to its source rectangle.
    ///
    /// `x` and `y` may be negative or beyond the image's tile count; the
    /// resulting rectangle then lies partly or wholly outside the image.
    /// Arithmetic saturates instead of overflowing.
    pub fn source_rect(&self, zoom: u32, x: i64, y: i64) -> Result<SourceRect, TileError> {
        // max_zoom <= 32 and tile_size <= u32::MAX, so this fits in i64.
        let pixels = self.source_tile_pixels(zoom)? as i64;

        let x0 = x.saturating_mul(pixels);
        let y0 = y.saturating_mul(pixels);

        Ok(SourceRect {
            x0,
            y0,
            x1: x0.saturating_add(pixels),
            y1: y0.saturating_add(pixels),
        })
    }

    /// Source rectangle for a [`TileKey`].
    pub fn tile_rect(&self, key: &TileKey) -> Result<SourceRect, TileError> {
        self.source_rect(key.zoom, i64::from(key.x), i64::from(key.y))
    }

    /// Number of columns and rows needed to cover the image at `zoom`.
    pub fn tiles_at(&self, zoom: u32) -> Result<(u64, u64), TileError> {
        let pixels = self.source_tile_pixels(zoom)?;
        Ok((
            u64::from(self.width).div_ceil(pixels),
            u64::from(self.height).div_ceil(pixels),
        ))
    }
}

// =============================================================================
// Tests
// =============================================================================
