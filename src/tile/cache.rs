//! Persistent tile cache.
//!
//! Encoded tiles are stored on disk, one file per tile:
//!
//! ```text
//! {root}/
//! ├── 0/
//! │   └── 0_0.png
//! ├── 1/
//! │   ├── 0_0.png
//! │   └── 1_0.png
//! └── tmp/            (in-progress writes)
//! ```
//!
//! # Atomic Writes
//!
//! A tile is first written to a uniquely named file under `{root}/tmp/` and
//! then renamed onto its final path. Rename within one filesystem is atomic,
//! so a concurrent reader sees either no file or the complete tile.
//!
//! # Growth
//!
//! The cache never evicts. It is bounded externally: the service clears it
//! whenever the source image changes, so it holds at most one pyramid.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use serde::Serialize;
use tokio::fs;
use tracing::debug;

use super::encoder::TILE_EXTENSION;
use super::pyramid::TileKey;
use crate::error::CacheError;

/// Name of the temporary-write directory under the cache root.
const TMP_DIR: &str = "tmp";

/// Distinguishes temporary files written by concurrent puts in one process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Number and total size of cached tiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheUsage {
    pub tiles: u64,
    pub bytes: u64,
}

// =============================================================================
// Disk Tile Cache
// =============================================================================

/// On-disk store of encoded tiles keyed by [`TileKey`].
///
/// # Example
///
/// ```
/// use tile_pyramid::tile::{DiskTileCache, TileKey};
///
/// #[tokio::main]
/// async fn main() {
///     let dir = tempfile::tempdir().unwrap();
///     let cache = DiskTileCache::open(dir.path().join("tiles")).await.unwrap();
///
///     let key = TileKey::new(0, 0, 0);
///     assert!(cache.get(&key).await.unwrap().is_none());
///
///     cache.put(&key, b"tile bytes").await.unwrap();
///     assert_eq!(cache.get(&key).await.unwrap().unwrap().as_ref(), b"tile bytes");
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DiskTileCache {
    root: PathBuf,
    tmp_dir: PathBuf,
}

impl DiskTileCache {
    /// Open a cache rooted at `root`, creating the directory layout.
    ///
    /// Existing tiles are kept.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        let tmp_dir = root.join(TMP_DIR);

        fs::create_dir_all(&tmp_dir)
            .await
            .map_err(|e| CacheError::io(&tmp_dir, e))?;

        Ok(Self { root, tmp_dir })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final path of a tile: `{root}/{z}/{x}_{y}.png`.
    pub fn tile_path(&self, key: &TileKey) -> PathBuf {
        self.root
            .join(key.zoom.to_string())
            .join(format!("{}_{}.{}", key.x, key.y, TILE_EXTENSION))
    }

    fn temp_path(&self, key: &TileKey) -> PathBuf {
        let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.tmp_dir.join(format!(
            "{}_{}_{}.{}.{}.tmp",
            key.zoom,
            key.x,
            key.y,
            std::process::id(),
            seq
        ))
    }

    /// Read a cached tile.
    ///
    /// Returns `Ok(None)` when the tile has not been stored.
    pub async fn get(&self, key: &TileKey) -> Result<Option<Bytes>, CacheError> {
        let path = self.tile_path(key);

        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }

    /// Check whether a tile is stored, without reading it.
    pub async fn contains(&self, key: &TileKey) -> bool {
        fs::try_exists(self.tile_path(key)).await.unwrap_or(false)
    }

    /// Store a tile, replacing any previous bytes for the key.
    pub async fn put(&self, key: &TileKey, data: &[u8]) -> Result<(), CacheError> {
        let path = self.tile_path(key);
        let temp_path = self.temp_path(key);

        fs::write(&temp_path, data)
            .await
            .map_err(|e| CacheError::io(&temp_path, e))?;

        if let Err(e) = self.promote(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        debug!(tile = %key, bytes = data.len(), "Tile stored");
        Ok(())
    }

    async fn promote(&self, temp_path: &Path, path: &Path) -> Result<(), CacheError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::io(parent, e))?;
        }

        fs::rename(temp_path, path)
            .await
            .map_err(|e| CacheError::io(path, e))
    }

    /// Remove every stored tile and stray temporary file.
    ///
    /// The directory layout is recreated afterwards, so the cache is usable
    /// immediately. Clearing an already empty cache is a no-op.
    pub async fn clear(&self) -> Result<(), CacheError> {
        match fs::read_dir(&self.root).await {
            Ok(mut entries) => {
                while let Some(entry) = entries
                    .next_entry()
                    .await
                    .map_err(|e| CacheError::io(&self.root, e))?
                {
                    let path = entry.path();
                    let file_type = entry
                        .file_type()
                        .await
                        .map_err(|e| CacheError::io(&path, e))?;

                    let removed = if file_type.is_dir() {
                        fs::remove_dir_all(&path).await
                    } else {
                        fs::remove_file(&path).await
                    };

                    match removed {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => return Err(CacheError::io(&path, e)),
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(CacheError::io(&self.root, e)),
        }

        fs::create_dir_all(&self.tmp_dir)
            .await
            .map_err(|e| CacheError::io(&self.tmp_dir, e))?;

        debug!(root = %self.root.display(), "Tile cache cleared");
        Ok(())
    }

    /// Count stored tiles and their total size.
    pub async fn usage(&self) -> Result<CacheUsage, CacheError> {
        let mut usage = CacheUsage::default();

        let mut levels = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(usage),
            Err(e) => return Err(CacheError::io(&self.root, e)),
        };

        while let Some(level) = levels
            .next_entry()
            .await
            .map_err(|e| CacheError::io(&self.root, e))?
        {
            let level_path = level.path();
            let is_dir = level
                .file_type()
                .await
                .map_err(|e| CacheError::io(&level_path, e))?
                .is_dir();
            if level.file_name() == TMP_DIR || !is_dir {
                continue;
            }

            let mut tiles = fs::read_dir(&level_path)
                .await
                .map_err(|e| CacheError::io(&level_path, e))?;

            while let Some(tile) = tiles
                .next_entry()
                .await
                .map_err(|e| CacheError::io(&level_path, e))?
            {
                let tile_path = tile.path();
                if tile_path.extension().and_then(|e| e.to_str()) != Some(TILE_EXTENSION) {
                    continue;
                }
                let metadata = tile
                    .metadata()
                    .await
                    .map_err(|e| CacheError::io(&tile_path, e))?;
                usage.tiles += 1;
                usage.bytes += metadata.len();
            }
        }

        Ok(usage)
    }
}

// =============================================================================
// Tests
// =============================================================================
