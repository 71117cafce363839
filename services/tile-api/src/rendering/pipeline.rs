//! Tile compute orchestration.
//!
//! Every tile kind runs the same steps: resolve the tile window, read and
//! resample the bands, turn them into RGBA, encode. Index tiles evaluate a
//! formula and apply a colormap; true-color tiles scale three bands; VARI
//! tiles are an index tile with a fixed ramp.

use super::sampling::SamplePlan;
use super::window::{resolve_tile_window, RasterGrid, TileWindow};
use band_math::compute::resolve_variables;
use band_math::indices::DEFAULT_COLORMAP;
use band_math::{evaluate_bands, get_index, BandSet, CompiledExpression, SpectralIndexDefinition};
use projection::PointProjector;
use renderer::colormap::{colormap_or_default, DEFAULT_LUT_RESOLUTION};
use renderer::encode::DEFAULT_QUALITY;
use renderer::{encode, gradient, png, ColorMap, ImageFormat, LutCache, Stretch};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use storage::DatasetEntry;
use tile_common::{TileCoord, TileError, TileResult};
use tracing::debug;

/// Output size and encoding of a tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub size: usize,
    pub format: ImageFormat,
    pub quality: u8,
}

impl RenderOptions {
    pub fn png(size: usize) -> Self {
        Self {
            size,
            format: ImageFormat::Png,
            quality: DEFAULT_QUALITY,
        }
    }
}

/// Where an index tile's formula comes from.
#[derive(Debug, Clone)]
pub enum FormulaSource {
    Index(&'static SpectralIndexDefinition),
    Equation(String),
}

/// A validated, compiled formula.
#[derive(Debug, Clone)]
pub struct PreparedFormula {
    pub source: FormulaSource,
    pub expression: CompiledExpression,
}

impl PreparedFormula {
    /// Validate the formula parameters of an index tile request.
    ///
    /// `index_name` wins when both are given.
    pub fn from_params(equation: Option<&str>, index_name: Option<&str>) -> TileResult<Self> {
        fn non_empty(s: Option<&str>) -> Option<&str> {
            s.map(str::trim).filter(|s| !s.is_empty())
        }

        let source = match (non_empty(index_name), non_empty(equation)) {
            (Some(code), _) => FormulaSource::Index(
                get_index(code).ok_or_else(|| TileError::UnknownIndex(code.to_string()))?,
            ),
            (None, Some(equation)) => FormulaSource::Equation(equation.to_string()),
            (None, None) => return Err(TileError::MissingFormulaOrIndex),
        };

        let text = match &source {
            FormulaSource::Index(def) => def.equation,
            FormulaSource::Equation(equation) => equation.as_str(),
        };
        let expression = CompiledExpression::compile(text)?;
        Ok(Self { source, expression })
    }

    pub fn index(&self) -> Option<&'static SpectralIndexDefinition> {
        match self.source {
            FormulaSource::Index(def) => Some(def),
            FormulaSource::Equation(_) => None,
        }
    }

    pub fn default_colormap(&self) -> &'static str {
        self.index()
            .map(|def| def.recommended_colormap)
            .unwrap_or(DEFAULT_COLORMAP)
    }
}

/// Parse `"a,b"` into two finite numbers.
pub fn parse_pair(raw: &str) -> Option<(f64, f64)> {
    let (a, b) = raw.split_once(',')?;
    let a: f64 = a.trim().parse().ok()?;
    let b: f64 = b.trim().parse().ok()?;
    (a.is_finite() && b.is_finite()).then_some((a, b))
}

/// Pick the stretch for an index tile.
///
/// Explicit `rescale` beats `percentiles`, which beats the index's own
/// display range. Free formulas fall back to a 2/98 percentile stretch.
/// Malformed values are ignored.
pub fn select_stretch(
    rescale: Option<&str>,
    percentiles: Option<&str>,
    index: Option<&SpectralIndexDefinition>,
) -> Stretch {
    if let Some((min, max)) = rescale.and_then(parse_pair) {
        return Stretch::Fixed { min, max };
    }
    if let Some((low, high)) = percentiles.and_then(parse_pair) {
        return Stretch::Percentile { low, high };
    }
    match index {
        Some(def) => {
            let (min, max) = def.display_range();
            Stretch::Fixed { min, max }
        }
        None => Stretch::default(),
    }
}

/// Everything an index tile needs beyond the tile address.
#[derive(Debug, Clone)]
pub struct IndexTileRequest {
    pub formula: PreparedFormula,
    pub colormap: &'static ColorMap,
    pub stretch: Stretch,
}

impl IndexTileRequest {
    pub fn new(formula: PreparedFormula, colormap: Option<&str>, stretch: Stretch) -> Self {
        let name = colormap
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| formula.default_colormap());
        Self {
            colormap: colormap_or_default(name),
            formula,
            stretch,
        }
    }
}

/// Value statistics of an index tile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndexStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

#[derive(Debug, Clone)]
pub struct RenderedTile {
    pub body: Vec<u8>,
    pub format: ImageFormat,
    /// `None` when the tile had no coverage
    pub window: Option<TileWindow>,
    pub stats: Option<IndexStats>,
}

impl RenderedTile {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    /// `requested->effective` when the tile was served from one zoom up.
    pub fn zoom_correction(&self) -> Option<String> {
        self.window
            .filter(TileWindow::zoom_corrected)
            .map(|w| w.correction_label())
    }

    pub fn has_coverage(&self) -> bool {
        self.window.is_some()
    }
}

/// Fully transparent PNG, served for tiles outside the dataset whatever
/// format was requested.
pub fn transparent_tile(size: usize) -> TileResult<RenderedTile> {
    Ok(RenderedTile {
        body: png::transparent_png(size, size)?,
        format: ImageFormat::Png,
        window: None,
        stats: None,
    })
}

/// Stateless apart from the LUT cache; shared by all requests.
pub struct TileRenderer {
    projector: Arc<dyn PointProjector>,
    luts: LutCache,
}

impl TileRenderer {
    pub fn new(projector: Arc<dyn PointProjector>) -> Self {
        Self {
            projector,
            luts: LutCache::new(),
        }
    }

    pub fn projector(&self) -> &Arc<dyn PointProjector> {
        &self.projector
    }

    pub fn lut_count(&self) -> usize {
        self.luts.len()
    }

    /// Render a formula tile through a colormap.
    pub async fn render_index(
        &self,
        entry: &DatasetEntry,
        coord: TileCoord,
        request: &IndexTileRequest,
        options: RenderOptions,
    ) -> TileResult<RenderedTile> {
        let expression = &request.formula.expression;
        // Fail on unknown aliases before touching pixels
        resolve_variables(expression, &entry.bands)?;

        let Some((window, bands)) = self.read_tile(entry, coord, options.size, None).await? else {
            return transparent_tile(options.size);
        };

        let started = Instant::now();
        let result = evaluate_bands(expression, &entry.bands, &bands)?;
        let (min, max) = request.stretch.bounds(&result.data);
        let lut = self.luts.get(request.colormap, DEFAULT_LUT_RESOLUTION);
        let pixels = gradient::render_with_lut(&result.data, result.width, result.height, min, max, &lut);
        debug!(
            tile = %window.effective,
            colormap = request.colormap.name,
            stretch_min = min,
            stretch_max = max,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Evaluated index tile"
        );

        let body = encode_tile(pixels, options).await?;
        Ok(RenderedTile {
            body,
            format: options.format,
            window: Some(window),
            stats: Some(IndexStats {
                min: result.min,
                max: result.max,
                mean: result.mean,
            }),
        })
    }

    /// Render the VARI index with its fixed red-yellow-green ramp.
    pub async fn render_vari(
        &self,
        entry: &DatasetEntry,
        coord: TileCoord,
        options: RenderOptions,
    ) -> TileResult<RenderedTile> {
        let formula = PreparedFormula::from_params(None, Some("VARI"))?;
        resolve_variables(&formula.expression, &entry.bands)?;

        let Some((window, bands)) = self.read_tile(entry, coord, options.size, None).await? else {
            return transparent_tile(options.size);
        };

        let result = evaluate_bands(&formula.expression, &entry.bands, &bands)?;
        let pixels = gradient::render_vari(&result.data, result.width, result.height);

        let body = encode_tile(pixels, options).await?;
        Ok(RenderedTile {
            body,
            format: options.format,
            window: Some(window),
            stats: Some(IndexStats {
                min: result.min,
                max: result.max,
                mean: result.mean,
            }),
        })
    }

    /// Render red, green and blue bands as an opaque true-color tile.
    pub async fn render_true_color(
        &self,
        entry: &DatasetEntry,
        coord: TileCoord,
        options: RenderOptions,
    ) -> TileResult<RenderedTile> {
        let rgb = true_color_bands(entry)?;
        let Some((window, bands)) = self.read_tile(entry, coord, options.size, Some(&rgb)).await? else {
            return transparent_tile(options.size);
        };

        let channel = |i: usize| bands.band(i).unwrap_or(&[]);
        let pixels = gradient::render_rgb(
            [channel(0), channel(1), channel(2)],
            bands.valid_mask(),
            options.size,
            options.size,
        );

        let body = encode_tile(pixels, options).await?;
        Ok(RenderedTile {
            body,
            format: options.format,
            window: Some(window),
            stats: None,
        })
    }

    /// Resolve, read and resample the tile. `None` means no coverage.
    ///
    /// With `band_indices` unset every band is read in raster order.
    async fn read_tile(
        &self,
        entry: &DatasetEntry,
        coord: TileCoord,
        size: usize,
        band_indices: Option<&[usize]>,
    ) -> TileResult<Option<(TileWindow, BandSet)>> {
        let grid = RasterGrid {
            transform: entry.transform,
            width: entry.width,
            height: entry.height,
            geographic_bounds: entry.geographic_bounds,
        };
        let window = match resolve_tile_window(coord, &grid, self.projector.as_ref()) {
            Ok(window) => window,
            Err(TileError::NoCoverage) => {
                debug!(dataset = %entry.id, tile = %coord, "Tile outside dataset");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let all: Vec<usize>;
        let band_indices = match band_indices {
            Some(indices) => indices,
            None => {
                all = (0..entry.bands.band_count()).collect();
                &all
            }
        };

        let data = entry.raster.read_window(window.window, band_indices).await?;
        let plan = SamplePlan::new(&window, &entry.transform, size);
        let bands = plan.sample(&data, entry.nodata())?;
        Ok(Some((window, bands)))
    }
}

/// Band indices used for red, green and blue.
///
/// Aliases are tried first, then the first three bands. Rasters with fewer
/// than three bands render their first band as grey.
fn true_color_bands(entry: &DatasetEntry) -> TileResult<[usize; 3]> {
    let bands = &entry.bands;
    if let (Some(r), Some(g), Some(b)) = (
        bands.index_of("red"),
        bands.index_of("green"),
        bands.index_of("blue"),
    ) {
        return Ok([r, g, b]);
    }
    match bands.band_count() {
        0 => Err(TileError::generation(format!("Dataset '{}' has no bands", entry.id))),
        1 | 2 => Ok([0, 0, 0]),
        _ => Ok([0, 1, 2]),
    }
}

async fn encode_tile(pixels: Vec<u8>, options: RenderOptions) -> TileResult<Vec<u8>> {
    let RenderOptions { size, format, quality } = options;
    let encoded = tokio::task::spawn_blocking(move || encode(&pixels, size, size, format, quality))
        .await
        .map_err(|e| TileError::generation(format!("Encoder task failed: {}", e)))??;
    Ok(encoded)
}
