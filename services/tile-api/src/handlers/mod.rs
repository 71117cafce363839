//! HTTP request handlers.
//!
//! - `tiles`: index, true-color and VARI tiles
//! - `indices`: spectral index and colormap catalogue
//! - `datasets`: available files and dataset cache management
//! - `health`: health check and Prometheus metrics
//! - `common`: response envelopes and error mapping

pub mod common;
pub mod datasets;
pub mod health;
pub mod indices;
pub mod tiles;

pub use common::{ApiError, ApiResponse, ErrorResponse};
pub use datasets::{evict_handler, list_available_handler, list_loaded_handler, load_handler};
pub use health::{health_handler, metrics_handler};
pub use indices::{colormaps_handler, index_info_handler, list_indices_handler};
pub use tiles::{
    default_index_tile_handler, index_tile_handler, true_color_tile_handler, vari_tile_handler,
};
