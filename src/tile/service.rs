//! Tile Service for orchestrating tile generation.
//!
//! The TileService is the main entry point for tile requests. It orchestrates:
//! - Zoom validation against the current image
//! - Cache lookups
//! - Single-flight rendering of missing tiles
//! - PNG encoding and result caching
//! - Image replacement with cache invalidation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         TileService                              │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                    get_tile()                           │    │
//! │  │  1. Take reload gate  4. Join or lead in-flight render  │    │
//! │  │  2. Validate zoom     5. Render + encode (blocking)     │    │
//! │  │  3. Check cache       6. Store & return                 │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │           │                    │                    │            │
//! │           ▼                    ▼                    ▼            │
//! │  ┌───────────────┐    ┌──────────────┐    ┌──────────────────┐  │
//! │  │ DiskTileCache │    │ImageRegistry │    │ Renderer/Encoder │  │
//! │  └───────────────┘    └──────────────┘    └──────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Consistency
//!
//! Tile requests hold the reload gate shared for their whole duration; image
//! swaps hold it exclusively while replacing the image and clearing the
//! cache. No request can pair the new image with tiles of the old one, and no
//! tile of the old image is written after the clear.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{Notify, RwLock};
use tracing::{debug, error, info, warn};

use crate::error::{CacheError, TileError};
use crate::source::{ImageLoader, ImageRegistry, ImageSnapshot, SourceImage};

use super::cache::{CacheUsage, DiskTileCache};
use super::encoder::PngTileEncoder;
use super::pyramid::TileKey;
use super::render::TileRenderer;

// =============================================================================
// Tile Request
// =============================================================================

/// A request for a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRequest {
    /// Zoom level (0 = whole image in one tile)
    pub zoom: u32,

    /// Tile X coordinate (0-indexed from left)
    pub x: u32,

    /// Tile Y coordinate (0-indexed from top)
    pub y: u32,
}

impl TileRequest {
    pub fn new(zoom: u32, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }

    pub fn key(&self) -> TileKey {
        TileKey::new(self.zoom, self.x, self.y)
    }
}

// =============================================================================
// Tile Response
// =============================================================================

/// Response from the tile service.
#[derive(Debug, Clone)]
pub struct TileResponse {
    /// The encoded PNG tile data
    pub data: Bytes,

    /// Whether this tile was served from cache
    pub cache_hit: bool,
}

// =============================================================================
// Statistics
// =============================================================================

#[derive(Debug, Default)]
struct TileStats {
    hits: AtomicU64,
    misses: AtomicU64,
    renders: AtomicU64,
    cache_read_errors: AtomicU64,
    cache_write_errors: AtomicU64,
}

impl TileStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> TileStatsSnapshot {
        TileStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            renders: self.renders.load(Ordering::Relaxed),
            cache_read_errors: self.cache_read_errors.load(Ordering::Relaxed),
            cache_write_errors: self.cache_write_errors.load(Ordering::Relaxed),
        }
    }
}

/// Counters since service start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TileStatsSnapshot {
    /// Requests answered from the cache
    pub hits: u64,
    /// Requests that did not find their tile in the cache
    pub misses: u64,
    /// Tiles actually rendered (misses minus deduplicated ones)
    pub renders: u64,
    /// Cache reads that failed and were treated as misses
    pub cache_read_errors: u64,
    /// Cache writes that failed; the tile was still served
    pub cache_write_errors: u64,
}

// =============================================================================
// Single-flight
// =============================================================================

#[derive(Debug, Clone, Default)]
enum Slot {
    #[default]
    Pending,
    Done(Result<Bytes, TileError>),
    /// The leader was cancelled before producing a result
    Abandoned,
}

/// State for an in-flight render of one key.
#[derive(Debug, Default)]
struct InFlight {
    /// Notification for waiters
    notify: Notify,
    /// Outcome of the render (set before waiters are notified)
    slot: Mutex<Slot>,
}

impl InFlight {
    fn slot(&self) -> Slot {
        lock(&self.slot).clone()
    }

    fn settle(&self, slot: Slot) {
        *lock(&self.slot) = slot;
        self.notify.notify_waiters();
    }

    /// Wait until the leader settles the slot.
    async fn wait(&self) -> Slot {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the slot so a settle in between is not lost
        notified.as_mut().enable();

        let slot = self.slot();
        if !matches!(slot, Slot::Pending) {
            return slot;
        }

        notified.await;
        self.slot()
    }
}

type InFlightMap = Mutex<HashMap<TileKey, Arc<InFlight>>>;

/// Held by the task rendering a key. Dropping it without [`finish`] (the
/// request was cancelled) releases followers so one of them can take over.
///
/// [`finish`]: LeaderGuard::finish
struct LeaderGuard<'a> {
    in_flight: &'a InFlightMap,
    key: TileKey,
    state: Arc<InFlight>,
    settled: bool,
}

impl LeaderGuard<'_> {
    fn finish(mut self, result: Result<Bytes, TileError>) {
        self.release(Slot::Done(result));
        self.settled = true;
    }

    fn release(&self, slot: Slot) {
        lock(self.in_flight).remove(&self.key);
        self.state.settle(slot);
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.release(Slot::Abandoned);
        }
    }
}

enum Role<'a> {
    Leader(LeaderGuard<'a>),
    Follower(Arc<InFlight>),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Tile Service
// =============================================================================

/// Service for generating and caching tiles.
///
/// # Type Parameters
///
/// * `L` - The loader used to (re)load the source image
///
/// # Example
///
/// ```ignore
/// use tile_pyramid::source::{ImageRegistry, LocalImageLoader};
/// use tile_pyramid::tile::{DiskTileCache, TileRequest, TileService};
///
/// let registry = ImageRegistry::open(LocalImageLoader::new("data"), 256).await?;
/// let cache = DiskTileCache::open("tiles").await?;
/// let service = TileService::new(registry, cache);
///
/// let response = service.get_tile(TileRequest::new(0, 0, 0)).await?;
/// println!("Tile size: {} bytes, cache hit: {}", response.data.len(), response.cache_hit);
/// ```
pub struct TileService<L: ImageLoader> {
    /// Holder of the current source image
    registry: ImageRegistry<L>,

    /// Persistent store of encoded tiles
    cache: DiskTileCache,

    renderer: TileRenderer,

    encoder: PngTileEncoder,

    /// Renders currently running, by key
    in_flight: InFlightMap,

    /// Shared by tile requests, exclusive for image swaps
    reload_gate: RwLock<()>,

    /// False after a clear failed; cached tiles may belong to an old image
    cache_trusted: AtomicBool,

    stats: TileStats,
}

impl<L: ImageLoader> TileService<L> {
    /// Create a new tile service with the default encoder.
    ///
    /// The service owns the registry, so every image swap goes through
    /// [`replace_image`](Self::replace_image) or [`reload`](Self::reload) and
    /// clears the cache.
    pub fn new(registry: ImageRegistry<L>, cache: DiskTileCache) -> Self {
        let renderer = TileRenderer::new(registry.tile_size());
        Self {
            registry,
            cache,
            renderer,
            encoder: PngTileEncoder::new(),
            in_flight: Mutex::new(HashMap::new()),
            reload_gate: RwLock::new(()),
            cache_trusted: AtomicBool::new(true),
            stats: TileStats::default(),
        }
    }

    /// Use a specific PNG encoder.
    pub fn with_encoder(mut self, encoder: PngTileEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    /// Get a tile, using cache when available.
    ///
    /// Any `x`/`y` is accepted at a valid zoom; tiles beyond the image are
    /// rendered as background.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The zoom level is above the current image's max zoom
    /// - Rendering or encoding fails
    ///
    /// Cache I/O failures are logged and counted but never fail the request.
    pub async fn get_tile(&self, request: TileRequest) -> Result<TileResponse, TileError> {
        let _gate = self.reload_gate.read().await;

        let snapshot = self.registry.current().await;
        snapshot.pyramid().check_zoom(request.zoom)?;
        let key = request.key();

        if let Some(data) = self.read_cached(&key).await {
            TileStats::bump(&self.stats.hits);
            debug!(tile = %key, "Tile cache hit");
            return Ok(TileResponse {
                data,
                cache_hit: true,
            });
        }

        TileStats::bump(&self.stats.misses);
        debug!(tile = %key, "Tile cache miss");

        let data = self.render_once(key, &snapshot).await?;
        Ok(TileResponse {
            data,
            cache_hit: false,
        })
    }

    /// Render `key`, joining a concurrent render of the same key if one runs.
    async fn render_once(&self, key: TileKey, snapshot: &ImageSnapshot) -> Result<Bytes, TileError> {
        loop {
            let role = {
                let mut in_flight = lock(&self.in_flight);
                match in_flight.get(&key) {
                    Some(state) => Role::Follower(state.clone()),
                    None => {
                        let state = Arc::new(InFlight::default());
                        in_flight.insert(key, state.clone());
                        Role::Leader(LeaderGuard {
                            in_flight: &self.in_flight,
                            key,
                            state,
                            settled: false,
                        })
                    }
                }
            };

            match role {
                Role::Leader(guard) => {
                    let result = self.render_and_store(key, snapshot).await;
                    guard.finish(result.clone());
                    return result;
                }
                Role::Follower(state) => match state.wait().await {
                    Slot::Done(result) => return result,
                    _ => debug!(tile = %key, "In-flight render abandoned, retrying"),
                },
            }
        }
    }

    async fn render_and_store(
        &self,
        key: TileKey,
        snapshot: &ImageSnapshot,
    ) -> Result<Bytes, TileError> {
        // A previous leader may have stored the tile after our lookup
        if let Some(data) = self.read_cached(&key).await {
            return Ok(data);
        }

        let rect = snapshot.pyramid().tile_rect(&key)?;
        let image = snapshot.image().clone();
        let renderer = self.renderer;
        let encoder = self.encoder;

        let data = tokio::task::spawn_blocking(move || {
            let tile = renderer.render(&image, &rect)?;
            encoder.encode(&tile)
        })
        .await
        .map_err(|e| TileError::Render {
            message: format!("render task failed: {}", e),
        })??;

        TileStats::bump(&self.stats.renders);
        debug!(tile = %key, bytes = data.len(), "Tile rendered");

        if self.cache_trusted.load(Ordering::Acquire) {
            if let Err(e) = self.cache.put(&key, &data).await {
                TileStats::bump(&self.stats.cache_write_errors);
                warn!(tile = %key, error = %e, "Failed to store tile, serving uncached");
            }
        }

        Ok(data)
    }

    async fn read_cached(&self, key: &TileKey) -> Option<Bytes> {
        if !self.cache_trusted.load(Ordering::Acquire) {
            return None;
        }

        match self.cache.get(key).await {
            Ok(data) => data,
            Err(e) => {
                TileStats::bump(&self.stats.cache_read_errors);
                warn!(tile = %key, error = %e, "Failed to read cached tile, rendering");
                None
            }
        }
    }

    /// Load a fresh image through the registry's loader and swap it in.
    ///
    /// The image is decoded before the reload gate is taken, so tiles keep
    /// being served from the old image meanwhile. On load failure the old
    /// image and its cached tiles stay active.
    pub async fn reload(&self) -> Result<Arc<ImageSnapshot>, TileError> {
        let image = self.registry.loader().load().await.map_err(|e| {
            warn!(error = %e, "Reload failed, keeping current image");
            e
        })?;
        self.replace_image(image).await
    }

    /// Swap in `image` and clear every cached tile.
    ///
    /// # Errors
    ///
    /// Returns [`TileError::Image`] if the image cannot be tiled (the current
    /// image stays active) and [`TileError::Cache`] if the cache could not be
    /// cleared. In the latter case the new image is active and the cache is
    /// bypassed until a later clear succeeds.
    pub async fn replace_image(&self, image: SourceImage) -> Result<Arc<ImageSnapshot>, TileError> {
        let _gate = self.reload_gate.write().await;

        let snapshot = self.registry.replace(image).await?;
        self.clear_locked().await?;

        info!(
            generation = snapshot.generation(),
            max_zoom = snapshot.pyramid().max_zoom(),
            "Tile cache invalidated"
        );
        Ok(snapshot)
    }

    /// Remove every cached tile.
    pub async fn clear_cache(&self) -> Result<(), TileError> {
        let _gate = self.reload_gate.write().await;
        self.clear_locked().await
    }

    async fn clear_locked(&self) -> Result<(), TileError> {
        match self.cache.clear().await {
            Ok(()) => {
                self.cache_trusted.store(true, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                self.cache_trusted.store(false, Ordering::Release);
                error!(error = %e, "Failed to clear tile cache, bypassing it");
                Err(e.into())
            }
        }
    }

    /// Get the current image snapshot.
    pub async fn snapshot(&self) -> Arc<ImageSnapshot> {
        self.registry.current().await
    }

    /// Get request and render counters.
    pub fn stats(&self) -> TileStatsSnapshot {
        self.stats.snapshot()
    }

    /// Count tiles currently stored on disk.
    pub async fn cache_usage(&self) -> Result<CacheUsage, CacheError> {
        self.cache.usage().await
    }

    pub fn cache(&self) -> &DiskTileCache {
        &self.cache
    }

    pub fn tile_size(&self) -> u32 {
        self.renderer.tile_size()
    }
}

// =============================================================================
// Tests
// =============================================================================
