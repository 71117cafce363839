//! Raster tile compute service.
//!
//! Serves true-color, VARI and band-algebra tiles from GeoTIFF datasets.
//! The library exposes the router and its modules for integration tests.

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod rendering;
pub mod state;
pub mod sweeper;

use axum::{
    extract::Extension,
    http::{HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use state::AppState;

/// Build the HTTP router over shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origin);

    Router::new()
        // Tiles
        .route("/index/:id/:z/:x/:y", get(handlers::index_tile_handler))
        // Params sharing a segment must share a name; extraction is positional
        .route("/index/:id/:x/:y", get(handlers::default_index_tile_handler))
        .route("/tile/:id/:z/:x/:y", get(handlers::true_color_tile_handler))
        .route("/vari/:id/:z/:x/:y", get(handlers::vari_tile_handler))
        // Catalogue
        .route("/index/list", get(handlers::list_indices_handler))
        .route("/index/info/:code", get(handlers::index_info_handler))
        .route("/index/colormaps", get(handlers::colormaps_handler))
        // Datasets
        .route("/datasets", get(handlers::list_available_handler))
        .route("/datasets/loaded", get(handlers::list_loaded_handler))
        .route("/datasets/load", post(handlers::load_handler))
        .route("/datasets/:id", delete(handlers::evict_handler))
        // Health and metrics
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any)
        .expose_headers([handlers::common::X_ZOOM_CORRECTED.clone()]);

    if origin.trim() == "*" {
        return layer.allow_origin(Any);
    }
    match HeaderValue::from_str(origin.trim()) {
        Ok(value) => layer.allow_origin(value),
        Err(e) => {
            warn!(origin, error = %e, "Invalid CORS_ORIGIN, allowing any origin");
            layer.allow_origin(Any)
        }
    }
}
