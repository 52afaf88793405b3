//! In-memory source raster.

use std::path::{Path, PathBuf};

use image::{imageops, RgbImage};

use crate::error::ImageError;

/// The base image tiles are cut from.
///
/// Pixels are RGB8 and never mutated after construction. A new image replaces
/// the old one wholesale (see [`crate::source::ImageRegistry`]).
#[derive(Debug, Clone)]
pub struct SourceImage {
    pixels: RgbImage,
    origin: Option<PathBuf>,
}

impl SourceImage {
    /// Wrap decoded pixels.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::EmptyImage`] if either dimension is zero.
    pub fn new(pixels: RgbImage) -> Result<Self, ImageError> {
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(ImageError::EmptyImage { width, height });
        }

        Ok(Self {
            pixels,
            origin: None,
        })
    }

    /// Record the file this image was loaded from.
    pub fn with_origin(mut self, path: impl Into<PathBuf>) -> Self {
        self.origin = Some(path.into());
        self
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// File the image was loaded from, if any.
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Copy a region of the image.
    ///
    /// The region is clamped to the image bounds, so the result may be
    /// smaller than requested (or empty).
    pub fn read_region(&self, x: u32, y: u32, width: u32, height: u32) -> RgbImage {
        let x = x.min(self.width());
        let y = y.min(self.height());
        let width = width.min(self.width() - x);
        let height = height.min(self.height() - y);

        imageops::crop_imm(&self.pixels, x, y, width, height).to_image()
    }
}
