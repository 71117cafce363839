//! Dataset discovery and cache management endpoints.

use axum::{
    extract::{Extension, Path},
    response::Response,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tile_common::TileError;
use tracing::{info, instrument};

use super::common::{ok, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadRequest {
    pub id_or_path: String,
}

/// GET /datasets - GeoTIFF files available in the data directory
#[instrument(skip(state))]
pub async fn list_available_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let data_dir = &state.config.data_dir;
    let files = storage::list_available(data_dir)
        .await
        .map_err(TileError::from)?;
    Ok(ok(json!({
        "dataDir": data_dir.display().to_string(),
        "defaultDataset": state.config.default_dataset,
        "count": files.len(),
        "datasets": files,
    })))
}

/// GET /datasets/loaded - resident cache entries
#[instrument(skip(state))]
pub async fn list_loaded_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    let loaded = state.cache.list_resident().await;
    ok(json!({
        "count": loaded.len(),
        "datasets": loaded,
    }))
}

/// POST /datasets/load - open a dataset ahead of tile requests
#[instrument(skip(state))]
pub async fn load_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<LoadRequest>,
) -> Result<Response, ApiError> {
    let entry = state.cache.get_or_open(&request.id_or_path).await?;
    Ok(ok(entry.info()))
}

/// DELETE /datasets/:id - evict from the cache
#[instrument(skip(state))]
pub async fn evict_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    if !state.cache.evict(&id).await {
        return Err(TileError::DatasetNotFound(format!("'{}' is not loaded", id)).into());
    }
    info!(dataset = %id, "Evicted on request");
    Ok(ok(json!({ "id": id, "evicted": true })))
}
