//! Loading the source image from local storage.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use tracing::debug;

use super::raster::SourceImage;
use crate::error::ImageError;

/// File extensions recognised as source images (compared case-insensitively).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "bmp"];

// =============================================================================
// ImageLoader Trait
// =============================================================================

/// Produces the source image on startup and on every reload.
///
/// This abstraction lets the registry work with different origins (a data
/// directory, a fixed file, an in-memory image in tests) without knowing
/// where pixels come from.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    /// Load and decode the current image.
    async fn load(&self) -> Result<SourceImage, ImageError>;
}

// =============================================================================
// Local Loader
// =============================================================================

/// Loads images from the local filesystem.
///
/// With an explicit image path that file is always loaded. Otherwise the data
/// directory is scanned and the most recently modified supported image wins,
/// so dropping a new file into the directory and reloading switches images.
#[derive(Debug, Clone)]
pub struct LocalImageLoader {
    data_dir: PathBuf,
    image_path: Option<PathBuf>,
}

impl LocalImageLoader {
    /// Create a loader that picks the newest image in `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            image_path: None,
        }
    }

    /// Always load `path` instead of scanning the data directory.
    pub fn with_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.image_path = Some(path.into());
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Resolve which file the next load will read.
    pub fn resolve_path(&self) -> Result<PathBuf, ImageError> {
        if let Some(ref path) = self.image_path {
            return Ok(path.clone());
        }

        find_latest_image(&self.data_dir)?.ok_or_else(|| {
            ImageError::NotFound(format!(
                "no {} files in {}",
                SUPPORTED_EXTENSIONS.join("/"),
                self.data_dir.display()
            ))
        })
    }
}

#[async_trait]
impl ImageLoader for LocalImageLoader {
    async fn load(&self) -> Result<SourceImage, ImageError> {
        let loader = self.clone();

        tokio::task::spawn_blocking(move || {
            let path = loader.resolve_path()?;
            debug!(path = %path.display(), "Decoding source image");
            decode_image_file(&path)
        })
        .await
        .map_err(|e| ImageError::Io(format!("image load task failed: {}", e)))?
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Check whether a path has a supported image extension.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Find the most recently modified supported image in `dir`.
///
/// Returns `Ok(None)` when the directory holds no supported image.
pub fn find_latest_image(dir: &Path) -> Result<Option<PathBuf>, ImageError> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ImageError::NotFound(format!("data directory {} does not exist", dir.display()))
        } else {
            ImageError::Io(format!("{}: {}", dir.display(), e))
        }
    })?;

    let mut latest: Option<(SystemTime, PathBuf)> = None;

    for entry in entries {
        let entry = entry.map_err(|e| ImageError::Io(format!("{}: {}", dir.display(), e)))?;
        let path = entry.path();

        if !is_supported_image(&path) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        let newer = match latest {
            Some((ref best, _)) => modified > *best,
            None => true,
        };
        if newer {
            latest = Some((modified, path));
        }
    }

    Ok(latest.map(|(_, path)| path))
}

/// Decode an image file into an RGB8 [`SourceImage`].
pub fn decode_image_file(path: &Path) -> Result<SourceImage, ImageError> {
    let decode_error = |message: String| ImageError::Decode {
        path: path.display().to_string(),
        message,
    };

    let reader = image::ImageReader::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ImageError::NotFound(path.display().to_string())
        } else {
            ImageError::Io(format!("{}: {}", path.display(), e))
        }
    })?;

    let decoded = reader
        .with_guessed_format()
        .map_err(|e| decode_error(e.to_string()))?
        .decode()
        .map_err(|e| decode_error(e.to_string()))?;

    Ok(SourceImage::new(decoded.into_rgb8())?.with_origin(path))
}

// =============================================================================
// Tests
// =============================================================================
