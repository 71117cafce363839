//! Spectral index and colormap catalogue endpoints.

use axum::{
    extract::Path,
    response::Response,
};
use band_math::{get_index, list_indices};
use renderer::colormap::colormap_names;
use serde_json::json;
use tile_common::TileError;
use tracing::instrument;

use super::common::{ok, ApiError};

/// GET /index/list
pub async fn list_indices_handler() -> Response {
    let indices = list_indices();
    ok(json!({
        "count": indices.len(),
        "indices": indices,
    }))
}

/// GET /index/info/:code
#[instrument]
pub async fn index_info_handler(Path(code): Path<String>) -> Result<Response, ApiError> {
    let def = get_index(&code).ok_or(TileError::UnknownIndex(code))?;
    Ok(ok(def))
}

/// GET /index/colormaps
pub async fn colormaps_handler() -> Response {
    let names = colormap_names();
    ok(json!({
        "count": names.len(),
        "colormaps": names,
    }))
}
