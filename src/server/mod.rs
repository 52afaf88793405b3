//! HTTP server layer for the tile pyramid.
//!
//! This module provides the HTTP API for serving tiles of the source image.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │     GET /tiles/{z}/{x}/{y}.png   GET /info   POST /reload       │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │           routes            │  │
//! │  │ (requests, error JSON)   │  │  (router config, CORS)      │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    health_handler, info_handler, reload_handler, tile_handler, AppState, ErrorResponse,
    HealthResponse, InfoResponse, LevelResponse, ReloadResponse, TilePathParams,
    CACHE_HIT_HEADER,
};
pub use routes::{create_router, RouterConfig};
