//! XYZ tile endpoints: formula/index tiles, true-color and VARI.

use axum::{
    extract::{Extension, Path, Query},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tile_common::{TileCoord, TileResult};
use tracing::{debug, instrument};

use super::common::{ApiError, X_ZOOM_CORRECTED};
use crate::config::{ServerConfig, MAX_TILE_SIZE, MIN_TILE_SIZE};
use crate::metrics::{self, TileKind};
use crate::rendering::{
    select_stretch, IndexTileRequest, PreparedFormula, RenderOptions,
    RenderedTile,
};
use crate::state::AppState;
use renderer::encode::DEFAULT_QUALITY;
use renderer::ImageFormat;

/// Output parameters shared by every tile endpoint.
///
/// Numbers are taken as strings so that malformed values fall back to
/// defaults instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputParams {
    pub size: Option<String>,
    pub format: Option<String>,
    pub quality: Option<String>,
}

impl OutputParams {
    /// Resolve against the server defaults. A file extension on the `y`
    /// segment selects the format when `format` is absent.
    pub fn render_options(&self, config: &ServerConfig, extension: Option<&str>) -> RenderOptions {
        let size = self
            .size
            .as_deref()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .map(|s| s.clamp(MIN_TILE_SIZE, MAX_TILE_SIZE))
            .unwrap_or(config.tile_size);

        let format = self
            .format
            .as_deref()
            .or(extension)
            .and_then(|f| f.parse::<ImageFormat>().ok())
            .unwrap_or_default();

        let quality = self
            .quality
            .as_deref()
            .and_then(|q| q.trim().parse::<u32>().ok())
            .map(|q| q.clamp(1, 100) as u8)
            .unwrap_or(DEFAULT_QUALITY);

        RenderOptions {
            size,
            format,
            quality,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexTileParams {
    pub equation: Option<String>,
    pub index_name: Option<String>,
    pub colormap: Option<String>,
    pub rescale: Option<String>,
    pub percentiles: Option<String>,
    #[serde(flatten)]
    pub output: OutputParams,
}

/// Split `"12.png"` into `("12", Some("png"))`.
pub fn split_extension(y: &str) -> (&str, Option<&str>) {
    match y.rsplit_once('.') {
        Some((index, ext)) => (index, Some(ext)),
        None => (y, None),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /index/:id/:z/:x/:y
#[instrument(skip(state))]
pub async fn index_tile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((id, z, x, y)): Path<(String, String, String, String)>,
    Query(params): Query<IndexTileParams>,
) -> Response {
    serve(TileKind::Index, render_index(&state, &id, &z, &x, &y, &params)).await
}

/// GET /index/:z/:x/:y against the default dataset
#[instrument(skip(state))]
pub async fn default_index_tile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((z, x, y)): Path<(String, String, String)>,
    Query(params): Query<IndexTileParams>,
) -> Response {
    serve(TileKind::Index, render_index(&state, "default", &z, &x, &y, &params)).await
}

/// GET /tile/:id/:z/:x/:y
#[instrument(skip(state))]
pub async fn true_color_tile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((id, z, x, y)): Path<(String, String, String, String)>,
    Query(params): Query<OutputParams>,
) -> Response {
    let render = render_band_tile(&state, TileKind::TrueColor, &id, &z, &x, &y, &params);
    serve(TileKind::TrueColor, render).await
}

/// GET /vari/:id/:z/:x/:y
#[instrument(skip(state))]
pub async fn vari_tile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((id, z, x, y)): Path<(String, String, String, String)>,
    Query(params): Query<OutputParams>,
) -> Response {
    let render = render_band_tile(&state, TileKind::Vari, &id, &z, &x, &y, &params);
    serve(TileKind::Vari, render).await
}

// ============================================================================
// Pipeline glue
// ============================================================================

/// Validate everything that does not need the dataset, then render.
async fn render_index(
    state: &AppState,
    id: &str,
    z: &str,
    x: &str,
    y: &str,
    params: &IndexTileParams,
) -> TileResult<RenderedTile> {
    let (y, ext) = split_extension(y);
    let coord = TileCoord::parse(z, x, y, state.config.max_zoom)?;
    let formula =
        PreparedFormula::from_params(params.equation.as_deref(), params.index_name.as_deref())?;
    let stretch = select_stretch(
        params.rescale.as_deref(),
        params.percentiles.as_deref(),
        formula.index(),
    );
    let request = IndexTileRequest::new(formula, params.colormap.as_deref(), stretch);
    let options = params.output.render_options(&state.config, ext);

    let entry = state.cache.get_or_open(id).await?;
    state.renderer.render_index(&entry, coord, &request, options).await
}

/// True-color and VARI tiles take no formula parameters.
async fn render_band_tile(
    state: &AppState,
    kind: TileKind,
    id: &str,
    z: &str,
    x: &str,
    y: &str,
    params: &OutputParams,
) -> TileResult<RenderedTile> {
    let (y, ext) = split_extension(y);
    let coord = TileCoord::parse(z, x, y, state.config.max_zoom)?;
    let options = params.render_options(&state.config, ext);

    let entry = state.cache.get_or_open(id).await?;
    match kind {
        TileKind::Vari => state.renderer.render_vari(&entry, coord, options).await,
        _ => state.renderer.render_true_color(&entry, coord, options).await,
    }
}

async fn serve<F>(kind: TileKind, render: F) -> Response
where
    F: std::future::Future<Output = TileResult<RenderedTile>>,
{
    metrics::record_request(kind);
    let started = Instant::now();

    match render.await {
        Ok(tile) => {
            metrics::record_render(kind, started.elapsed());
            debug!(
                kind = kind.as_str(),
                bytes = tile.body.len(),
                coverage = tile.has_coverage(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Tile served"
            );
            tile_response(tile)
        }
        Err(e) => ApiError(e).into_response(),
    }
}

fn tile_response(tile: RenderedTile) -> Response {
    let correction = tile.zoom_correction();
    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, tile.content_type())],
        tile.body,
    )
        .into_response();

    if let Some(label) = correction.and_then(|l| HeaderValue::from_str(&l).ok()) {
        response.headers_mut().insert(X_ZOOM_CORRECTED.clone(), label);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("12"), ("12", None));
        assert_eq!(split_extension("12.webp"), ("12", Some("webp")));
    }

    #[test]
    fn test_render_options_defaults() {
        let config = ServerConfig::default();
        let opts = OutputParams::default().render_options(&config, None);
        assert_eq!(opts, RenderOptions::png(256));
        assert_eq!(opts.quality, 90);
    }

    #[test]
    fn test_render_options_clamped_and_lenient() {
        let config = ServerConfig::default();
        let params = OutputParams {
            size: Some("5000".into()),
            format: Some("jpeg".into()),
            quality: Some("0".into()),
        };
        let opts = params.render_options(&config, None);
        assert_eq!(opts.size, MAX_TILE_SIZE);
        assert_eq!(opts.format, ImageFormat::Jpeg);
        assert_eq!(opts.quality, 1);

        let params = OutputParams {
            size: Some("big".into()),
            format: Some("gif".into()),
            quality: Some("x".into()),
        };
        let opts = params.render_options(&config, Some("webp"));
        assert_eq!(opts, RenderOptions::png(256));
    }

    #[test]
    fn test_extension_selects_format() {
        let config = ServerConfig::default();
        let opts = OutputParams::default().render_options(&config, Some("webp"));
        assert_eq!(opts.format, ImageFormat::Webp);
    }
}
