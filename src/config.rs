//! Configuration management for the tile server.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `TILES_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use tile_pyramid::config::Config;
//!
//! // Parse from command line and environment
//! let config = Config::parse();
//!
//! println!("Listening on {}", config.bind_address());
//! println!("Tiles cached in {}", config.cache_dir.display());
//! ```
//!
//! # Environment Variables
//!
//! All configuration options can be set via environment variables with the `TILES_` prefix:
//!
//! - `TILES_HOST` - Server bind address (default: 0.0.0.0)
//! - `TILES_PORT` - Server port (default: 5000)
//! - `TILES_DATA_DIR` - Directory scanned for the source image (default: data)
//! - `TILES_IMAGE` - Explicit source image, overrides the directory scan
//! - `TILES_CACHE_DIR` - Tile cache root (default: tiles)
//! - `TILES_TILE_SIZE` - Tile edge length in pixels (default: 256)
//! - `TILES_PNG_COMPRESSION` - fast, default or best (default: default)
//! - `TILES_KEEP_CACHE` - Keep cached tiles across restarts (default: false)
//! - `TILES_CACHE_MAX_AGE` - HTTP cache max-age seconds, 0 disables caching (default: 0)
//! - `TILES_CORS_ORIGINS` - Allowed CORS origins, comma-separated (default: any)

use std::path::PathBuf;

use clap::Parser;

use crate::tile::{PngCompression, DEFAULT_TILE_SIZE};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default directory scanned for source images.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default tile cache root.
pub const DEFAULT_CACHE_DIR: &str = "tiles";

/// Largest accepted tile edge length.
pub const MAX_TILE_SIZE: u32 = 4096;

/// Default HTTP cache max-age in seconds (0 = tell clients not to cache).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 0;

/// Cache-Control value sent when HTTP caching is disabled.
pub const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

// =============================================================================
// CLI Arguments
// =============================================================================

/// Tile Pyramid - serves one large image as a zoomable tile pyramid.
///
/// Tiles are rendered on demand from the source image, encoded as PNG and
/// cached on disk. Reloading the image invalidates every cached tile.
#[derive(Parser, Debug, Clone)]
#[command(name = "tile-pyramid")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "TILES_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "TILES_PORT")]
    pub port: u16,

    // =========================================================================
    // Image Configuration
    // =========================================================================
    /// Directory scanned for the most recently modified image.
    #[arg(long, default_value = DEFAULT_DATA_DIR, env = "TILES_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Serve this image instead of scanning the data directory.
    #[arg(long, env = "TILES_IMAGE")]
    pub image: Option<PathBuf>,

    // =========================================================================
    // Tile Configuration
    // =========================================================================
    /// Directory holding cached tiles.
    #[arg(long, default_value = DEFAULT_CACHE_DIR, env = "TILES_CACHE_DIR")]
    pub cache_dir: PathBuf,

    /// Tile edge length in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "TILES_TILE_SIZE")]
    pub tile_size: u32,

    /// PNG compression effort.
    #[arg(long, value_enum, default_value_t = PngCompression::Default, env = "TILES_PNG_COMPRESSION")]
    pub png_compression: PngCompression,

    /// Keep tiles cached by a previous run instead of clearing them on startup.
    ///
    /// Only safe when the source image has not changed since.
    #[arg(long, default_value_t = false, env = "TILES_KEEP_CACHE")]
    pub keep_cache: bool,

    /// HTTP Cache-Control max-age in seconds (0 disables client caching).
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "TILES_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "TILES_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.tile_size == 0 || self.tile_size > MAX_TILE_SIZE {
            return Err(format!(
                "tile_size must be between 1 and {}",
                MAX_TILE_SIZE
            ));
        }

        if self.data_dir.as_os_str().is_empty() {
            return Err("Data directory is required. Set --data-dir or TILES_DATA_DIR".to_string());
        }

        if self.cache_dir.as_os_str().is_empty() {
            return Err(
                "Cache directory is required. Set --cache-dir or TILES_CACHE_DIR".to_string(),
            );
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Cache-Control header value for tile responses.
    pub fn cache_control(&self) -> String {
        cache_control_value(self.cache_max_age)
    }
}

/// Cache-Control header value for a max-age in seconds.
pub fn cache_control_value(max_age: u32) -> String {
    if max_age == 0 {
        NO_CACHE.to_string()
    } else {
        format!("public, max-age={}", max_age)
    }
}

// =============================================================================
// Tests
// =============================================================================
