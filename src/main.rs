//! Tile Pyramid - serves one large image as zoomable PNG tiles.
//!
//! This binary starts the HTTP server and configures all components.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tile_pyramid::{
    config::Config,
    server::{create_router, RouterConfig},
    source::{ImageRegistry, LocalImageLoader},
    tile::{DiskTileCache, PngTileEncoder, TileService},
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    run_serve(config).await
}

// =============================================================================
// Serve
// =============================================================================

async fn run_serve(config: Config) -> ExitCode {
    info!("Tile Pyramid v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Data directory: {}", config.data_dir.display());
    if let Some(ref image) = config.image {
        info!("  Image: {}", image.display());
    }
    info!("  Cache directory: {}", config.cache_dir.display());
    info!(
        "  Tiles: {}px, PNG compression {}",
        config.tile_size, config.png_compression
    );

    if let Err(e) = ensure_dir(&config.data_dir).await {
        error!("Failed to create data directory {}: {}", config.data_dir.display(), e);
        return ExitCode::FAILURE;
    }

    // Load the source image; the server does not start without one
    let mut loader = LocalImageLoader::new(&config.data_dir);
    if let Some(ref image) = config.image {
        loader = loader.with_image(image);
    }

    let registry = match ImageRegistry::open(loader, config.tile_size).await {
        Ok(registry) => registry,
        Err(e) => {
            error!("Failed to load source image: {}", e);
            error!("");
            error!("  Please check:");
            error!(
                "    - {} contains a .jpg, .png, .tif or .bmp image",
                config.data_dir.display()
            );
            error!("    - or --image points to a readable image file");
            return ExitCode::FAILURE;
        }
    };

    // Open the tile cache
    let cache = match DiskTileCache::open(&config.cache_dir).await {
        Ok(cache) => cache,
        Err(e) => {
            error!("Failed to open tile cache: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if config.keep_cache {
        warn!("  Keeping cached tiles from a previous run (--keep-cache)");
    } else if let Err(e) = cache.clear().await {
        error!("Failed to clear tile cache: {}", e);
        return ExitCode::FAILURE;
    }

    let tile_service = TileService::new(registry, cache)
        .with_encoder(PngTileEncoder::with_compression(config.png_compression));

    let snapshot = tile_service.snapshot().await;
    info!(
        "  Pyramid: {}x{} image, zoom 0-{}",
        snapshot.pyramid().width(),
        snapshot.pyramid().height(),
        snapshot.pyramid().max_zoom()
    );

    let router = create_router(tile_service, build_router_config(&config));

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/info", addr);
    info!("    curl -o tile.png http://{}/tiles/0/0/0.png", addr);
    info!("    curl -X POST http://{}/reload", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn ensure_dir(path: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(path).await
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "tile_pyramid=debug,tower_http=debug"
    } else {
        "tile_pyramid=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new().with_cache_max_age(config.cache_max_age);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}
