//! Response envelopes and error mapping shared by all handlers.

use axum::{
    http::{HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use band_math::indices::{index_codes, list_indices};
use serde::Serialize;
use serde_json::{json, Value};
use tile_common::TileError;
use tracing::{error, warn};

use crate::metrics;

/// Set on tiles served from one zoom level above the requested one.
pub static X_ZOOM_CORRECTED: HeaderName = HeaderName::from_static("x-zoom-corrected");

// ============================================================================
// Success Envelope
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

/// Wrap a payload as `{"success": true, "data": ...}`.
pub fn ok<T: Serialize>(data: T) -> Response {
    Json(ApiResponse {
        success: true,
        data,
    })
    .into_response()
}

// ============================================================================
// Error Envelope
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorBody,
}

impl ErrorResponse {
    pub fn from_error(err: &TileError) -> Self {
        Self {
            success: false,
            error: ErrorBody {
                error: err.kind(),
                message: err.to_string(),
                status_code: err.http_status_code(),
                details: error_details(err),
            },
        }
    }
}

/// The valid choices a caller could have made instead.
fn error_details(err: &TileError) -> Option<Value> {
    match err {
        TileError::MissingFormulaOrIndex => Some(json!({ "availableIndices": index_codes() })),
        TileError::UnknownIndex(_) => {
            let indices: Vec<Value> = list_indices()
                .iter()
                .map(|def| json!({ "code": def.code, "equation": def.equation }))
                .collect();
            Some(json!({ "availableIndices": indices }))
        }
        TileError::InvalidTileCoordinate { z, x, y, max_zoom, reason } => Some(json!({
            "requested": { "z": z, "x": x, "y": y },
            "zoomRange": [0, max_zoom],
            "tileIndexRange": "0 <= x, y < 2^z",
            "reason": reason,
        })),
        TileError::UnresolvedBandAlias { available, .. } => {
            Some(json!({ "availableBands": available }))
        }
        _ => None,
    }
}

/// Handler error carrying a `TileError` to its JSON response.
#[derive(Debug)]
pub struct ApiError(pub TileError);

impl From<TileError> for ApiError {
    fn from(err: TileError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status =
            StatusCode::from_u16(err.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        metrics::record_error(err.kind());
        if status.is_server_error() {
            error!(kind = err.kind(), error = %err, "Request failed");
        } else {
            warn!(kind = err.kind(), error = %err, "Request rejected");
        }

        (status, Json(ErrorResponse::from_error(&err))).into_response()
    }
}
