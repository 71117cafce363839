//! Health and Prometheus endpoints.

use axum::{
    extract::Extension,
    http::header,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::common::ok;
use crate::state::AppState;

/// GET /health
pub async fn health_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    let stats = state.cache.stats();
    ok(json!({
        "healthy": true,
        "uptimeSecs": state.uptime_secs(),
        "residentDatasets": state.cache.resident_count().await,
        "datasetCache": {
            "hits": stats.hits.load(Ordering::Relaxed),
            "misses": stats.misses.load(Ordering::Relaxed),
            "opens": stats.opens.load(Ordering::Relaxed),
            "evictions": stats.evictions.load(Ordering::Relaxed),
            "hitRatePercent": stats.hit_rate(),
        },
        "colormapTables": state.renderer.lut_count(),
    }))
}

/// GET /metrics - Prometheus text exposition
pub async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.prometheus.render(),
    )
        .into_response()
}
