//! Error types for the tile service.

use thiserror::Error;

/// Result type alias using TileError.
pub type TileResult<T> = Result<T, TileError>;

/// Primary error type for tile requests.
///
/// Every variant except `NoCoverage` is reported to the caller. `NoCoverage`
/// is resolved to a transparent tile by the request pipeline.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    // === Request validation ===
    #[error("Invalid tile coordinates {z}/{x}/{y}: {reason}")]
    InvalidTileCoordinate {
        z: String,
        x: String,
        y: String,
        max_zoom: u32,
        reason: String,
    },

    #[error("Either \"equation\" or \"indexName\" query parameter must be provided")]
    MissingFormulaOrIndex,

    #[error("Index '{0}' not found")]
    UnknownIndex(String),

    #[error("Variable '{alias}' not found in available bands: {}", available.join(", "))]
    UnresolvedBandAlias {
        alias: String,
        available: Vec<String>,
    },

    #[error("Invalid expression: {0}")]
    ExpressionSyntaxError(String),

    // === Data ===
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("Requested tile does not intersect the dataset")]
    NoCoverage,

    // === Everything else ===
    #[error("Tile generation failed: {0}")]
    TileGenerationError(String),
}

impl TileError {
    /// Machine-readable error kind reported in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            TileError::InvalidTileCoordinate { .. } => "InvalidTileCoordinate",
            TileError::MissingFormulaOrIndex => "MissingFormulaOrIndex",
            TileError::UnknownIndex(_) => "UnknownIndex",
            TileError::UnresolvedBandAlias { .. } => "UnresolvedBandAlias",
            TileError::ExpressionSyntaxError(_) => "ExpressionSyntaxError",
            TileError::DatasetNotFound(_) => "DatasetNotFound",
            TileError::NoCoverage => "NoCoverage",
            TileError::TileGenerationError(_) => "TileGenerationError",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            TileError::InvalidTileCoordinate { .. }
            | TileError::MissingFormulaOrIndex
            | TileError::UnresolvedBandAlias { .. }
            | TileError::ExpressionSyntaxError(_) => 400,

            TileError::UnknownIndex(_) | TileError::DatasetNotFound(_) => 404,

            TileError::NoCoverage => 200,

            TileError::TileGenerationError(_) => 500,
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        TileError::TileGenerationError(message.into())
    }
}

impl From<std::io::Error> for TileError {
    fn from(err: std::io::Error) -> Self {
        TileError::TileGenerationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(TileError::MissingFormulaOrIndex.http_status_code(), 400);
        assert_eq!(TileError::UnknownIndex("FOO".into()).http_status_code(), 404);
        assert_eq!(TileError::DatasetNotFound("x".into()).http_status_code(), 404);
        assert_eq!(TileError::generation("boom").http_status_code(), 500);
    }

    #[test]
    fn test_unresolved_alias_message_lists_bands() {
        let err = TileError::UnresolvedBandAlias {
            alias: "nir".into(),
            available: vec!["Red".into(), "Green".into(), "Blue".into()],
        };
        assert_eq!(err.kind(), "UnresolvedBandAlias");
        assert_eq!(
            err.to_string(),
            "Variable 'nir' not found in available bands: Red, Green, Blue"
        );
    }
}
