//! PNG tile encoder.
//!
//! Every tile of a deployment is encoded with the same codec and settings.
//!
//! # Design Decisions
//!
//! - **Lossless**: tiles are PNG, so max-zoom tiles decode to the exact
//!   source pixels.
//!
//! - **Stable output**: compression level and row filter are fixed per
//!   encoder, so the same raster always produces the same bytes.
//!
//! - **RGB only**: tiles are three-channel; there is no alpha.

use std::fmt;
use std::io::Cursor;

use bytes::Bytes;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, ImageReader, RgbImage};

use crate::error::TileError;

/// MIME type of encoded tiles.
pub const TILE_CONTENT_TYPE: &str = "image/png";

/// File extension of encoded tiles.
pub const TILE_EXTENSION: &str = "png";

// =============================================================================
// Compression Level
// =============================================================================

/// PNG compression effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PngCompression {
    /// Fastest encoding, larger files
    Fast,
    /// Balanced speed and size
    #[default]
    Default,
    /// Smallest files, slowest encoding
    Best,
}

impl PngCompression {
    fn compression_type(self) -> CompressionType {
        match self {
            PngCompression::Fast => CompressionType::Fast,
            PngCompression::Default => CompressionType::Default,
            PngCompression::Best => CompressionType::Best,
        }
    }
}

impl fmt::Display for PngCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PngCompression::Fast => write!(f, "fast"),
            PngCompression::Default => write!(f, "default"),
            PngCompression::Best => write!(f, "best"),
        }
    }
}

// =============================================================================
// PNG Encoder
// =============================================================================

/// Encodes rendered tiles as PNG.
///
/// # Example
///
/// ```
/// use image::{Rgb, RgbImage};
/// use tile_pyramid::tile::PngTileEncoder;
///
/// let encoder = PngTileEncoder::new();
/// let tile = RgbImage::from_pixel(256, 256, Rgb([0, 0, 0]));
///
/// let png = encoder.encode(&tile).unwrap();
/// assert_eq!(encoder.dimensions(&png).unwrap(), (256, 256));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PngTileEncoder {
    compression: PngCompression,
}

impl PngTileEncoder {
    /// Create an encoder with default compression.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an encoder with the given compression effort.
    pub fn with_compression(compression: PngCompression) -> Self {
        Self { compression }
    }

    pub fn compression(&self) -> PngCompression {
        self.compression
    }

    /// Encode an RGB raster.
    ///
    /// # Errors
    ///
    /// Returns [`TileError::Encode`] if the PNG encoder rejects the raster.
    pub fn encode(&self, tile: &RgbImage) -> Result<Bytes, TileError> {
        let mut output = Vec::new();
        let encoder = PngEncoder::new_with_quality(
            &mut output,
            self.compression.compression_type(),
            FilterType::Adaptive,
        );

        encoder
            .write_image(
                tile.as_raw(),
                tile.width(),
                tile.height(),
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| TileError::Encode {
                message: e.to_string(),
            })?;

        Ok(Bytes::from(output))
    }

    /// Decode an encoded tile back to RGB pixels.
    pub fn decode(&self, data: &[u8]) -> Result<RgbImage, TileError> {
        let reader = ImageReader::with_format(Cursor::new(data), image::ImageFormat::Png);

        let img = reader.decode().map_err(|e| TileError::Encode {
            message: format!("invalid tile data: {}", e),
        })?;

        Ok(img.into_rgb8())
    }

    /// Get tile dimensions without fully decoding.
    pub fn dimensions(&self, data: &[u8]) -> Result<(u32, u32), TileError> {
        let reader = ImageReader::with_format(Cursor::new(data), image::ImageFormat::Png);

        reader.into_dimensions().map_err(|e| TileError::Encode {
            message: format!("invalid tile data: {}", e),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
