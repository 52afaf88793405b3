use thiserror::Error;

/// Errors raised while deriving the pyramid layout for an image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PyramidError {
    /// Tile size must be a positive number of pixels
    #[error("Invalid tile size: {0} (must be greater than 0)")]
    InvalidTileSize(u32),

    /// Image has a zero dimension and cannot be tiled
    #[error("Image has no pixels: {width}x{height}")]
    EmptyImage { width: u32, height: u32 },
}

/// Errors that can occur when loading the source image
#[derive(Debug, Clone, Error)]
pub enum ImageError {
    /// No usable image was found
    #[error("No source image found: {0}")]
    NotFound(String),

    /// Filesystem error while locating or reading the image
    #[error("I/O error: {0}")]
    Io(String),

    /// The file exists but could not be decoded
    #[error("Failed to decode {path}: {message}")]
    Decode { path: String, message: String },

    /// Decoded image has a zero dimension
    #[error("Image has no pixels: {width}x{height}")]
    EmptyImage { width: u32, height: u32 },

    /// Pyramid layout could not be derived for the image
    #[error("Invalid pyramid configuration: {0}")]
    Pyramid(#[from] PyramidError),
}

/// Errors from the on-disk tile cache
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Cache I/O error at {path}: {message}")]
    Io { path: String, message: String },
}

impl CacheError {
    pub(crate) fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        CacheError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Errors that can occur while serving a tile
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// Zoom level outside [0, max_zoom]
    #[error("Invalid zoom level {zoom} (max zoom is {max_zoom})")]
    InvalidZoom { zoom: u32, max_zoom: u32 },

    /// Tile path component is not a non-negative integer
    #[error("Invalid tile coordinate: {value:?}")]
    InvalidCoordinate { value: String },

    /// Rendering did not complete (worker panicked or was cancelled)
    #[error("Render failed: {message}")]
    Render { message: String },

    /// The rendered raster could not be encoded
    #[error("Encode failed: {message}")]
    Encode { message: String },

    /// Source image problem (load or reload)
    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    /// Tile cache could not be cleared after an image swap
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}
