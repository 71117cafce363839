//! Per-pixel evaluation of a compiled formula over a window of band samples.

use crate::bands::BandMetadata;
use crate::expression::CompiledExpression;
use rayon::prelude::*;
use tile_common::{TileError, TileResult};

/// Band samples for one pixel grid, one `Vec` per raw band, plus a validity
/// mask for pixels that fall outside the source raster.
#[derive(Debug, Clone)]
pub struct BandSet {
    width: usize,
    height: usize,
    bands: Vec<Vec<f32>>,
    valid: Vec<bool>,
}

impl BandSet {
    /// Create a band set where every pixel is valid.
    pub fn new(width: usize, height: usize, bands: Vec<Vec<f32>>) -> TileResult<Self> {
        let valid = vec![true; width * height];
        Self::with_mask(width, height, bands, valid)
    }

    pub fn with_mask(
        width: usize,
        height: usize,
        bands: Vec<Vec<f32>>,
        valid: Vec<bool>,
    ) -> TileResult<Self> {
        let len = width * height;
        if let Some((i, band)) = bands.iter().enumerate().find(|(_, b)| b.len() != len) {
            return Err(TileError::generation(format!(
                "band {} has {} samples, expected {}x{}",
                i,
                band.len(),
                width,
                height
            )));
        }
        if valid.len() != len {
            return Err(TileError::generation("coverage mask size mismatch"));
        }
        Ok(Self {
            width,
            height,
            bands,
            valid,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn band(&self, index: usize) -> Option<&[f32]> {
        self.bands.get(index).map(Vec::as_slice)
    }

    pub fn valid_mask(&self) -> &[bool] {
        &self.valid
    }

    pub fn is_valid(&self, pixel: usize) -> bool {
        self.valid.get(pixel).copied().unwrap_or(false)
    }
}

/// Scalar result grid plus statistics over its finite evaluated values.
///
/// Pixels outside the coverage mask hold NaN.
#[derive(Debug, Clone)]
pub struct IndexResult {
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, Copy)]
struct RowStats {
    min: f64,
    max: f64,
    sum: f64,
    count: usize,
}

impl Default for RowStats {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            count: 0,
        }
    }
}

impl RowStats {
    fn record(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.count += 1;
    }

    fn merge(self, other: RowStats) -> RowStats {
        RowStats {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            sum: self.sum + other.sum,
            count: self.count + other.count,
        }
    }
}

/// Map each of the expression's variables to a band index.
///
/// Fails with `UnresolvedBandAlias` on the first variable no band satisfies.
pub fn resolve_variables(
    expr: &CompiledExpression,
    metadata: &BandMetadata,
) -> TileResult<Vec<usize>> {
    expr.variables()
        .iter()
        .map(|var| {
            metadata
                .index_of(var)
                .ok_or_else(|| TileError::UnresolvedBandAlias {
                    alias: var.clone(),
                    available: metadata.band_names(),
                })
        })
        .collect()
}

/// Evaluate `expr` for every valid pixel of `bands`.
///
/// A pixel whose evaluation fails or is not finite gets 0 and is left out
/// of the statistics; the rest of the tile is unaffected.
pub fn evaluate_bands(
    expr: &CompiledExpression,
    metadata: &BandMetadata,
    bands: &BandSet,
) -> TileResult<IndexResult> {
    let slots = resolve_variables(expr, metadata)?;
    let sources: Vec<&[f32]> = slots
        .iter()
        .map(|&index| {
            bands.band(index).ok_or_else(|| {
                TileError::generation(format!(
                    "band index {} is out of range, dataset window has {} bands",
                    index,
                    bands.band_count()
                ))
            })
        })
        .collect::<TileResult<_>>()?;

    let width = bands.width();
    let height = bands.height();
    let mut data = vec![f32::NAN; width * height];
    if width == 0 || height == 0 {
        return Ok(IndexResult {
            data,
            width,
            height,
            min: 0.0,
            max: 1.0,
            mean: 0.0,
        });
    }

    let stats = data
        .par_chunks_mut(width)
        .enumerate()
        .map(|(row, out)| {
            let mut stats = RowStats::default();
            let mut values = vec![0.0f64; sources.len()];
            let mut stack = Vec::with_capacity(expr.program().len());
            let offset = row * width;

            for (col, cell) in out.iter_mut().enumerate() {
                let pixel = offset + col;
                if !bands.is_valid(pixel) {
                    continue;
                }
                for (value, source) in values.iter_mut().zip(&sources) {
                    *value = f64::from(source[pixel]);
                }
                match expr.evaluate_slots(&values, &mut stack) {
                    Ok(v) if v.is_finite() => {
                        *cell = v as f32;
                        stats.record(v);
                    }
                    _ => *cell = 0.0,
                }
            }
            stats
        })
        .reduce(RowStats::default, RowStats::merge);

    let (min, max, mean) = if stats.count == 0 {
        (0.0, 1.0, 0.0)
    } else {
        (stats.min, stats.max, stats.sum / stats.count as f64)
    };

    Ok(IndexResult {
        data,
        width,
        height,
        min,
        max,
        mean,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgbn(width: usize, height: usize, red: f32, nir: f32) -> BandSet {
        let len = width * height;
        BandSet::new(
            width,
            height,
            vec![vec![red; len], vec![0.2; len], vec![0.1; len], vec![nir; len]],
        )
        .unwrap()
    }

    #[test]
    fn test_ndvi_over_window() {
        let meta = BandMetadata::resolve(4, None);
        let expr = CompiledExpression::compile("(nir - red) / (nir + red)").unwrap();
        let result = evaluate_bands(&expr, &meta, &rgbn(4, 3, 0.1, 0.5)).unwrap();

        assert_eq!(result.data.len(), 12);
        for v in &result.data {
            assert!((*v - 0.666_667).abs() < 1e-5);
        }
        assert!((result.mean - 2.0 / 3.0).abs() < 1e-6);
        assert!((result.min - result.max).abs() < 1e-12);
    }

    #[test]
    fn test_unresolved_alias_lists_bands() {
        let meta = BandMetadata::resolve(3, None);
        let expr = CompiledExpression::compile("nir - red").unwrap();
        let bands = BandSet::new(1, 1, vec![vec![0.0], vec![0.0], vec![0.0]]).unwrap();
        match evaluate_bands(&expr, &meta, &bands) {
            Err(TileError::UnresolvedBandAlias { alias, available }) => {
                assert_eq!(alias, "nir");
                assert_eq!(available, vec!["Red", "Green", "Blue"]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_pixels_become_zero() {
        let meta = BandMetadata::resolve(3, None);
        let expr = CompiledExpression::compile("log(red)").unwrap();
        let bands = BandSet::new(
            3,
            1,
            vec![vec![-1.0, 1.0, 0.0], vec![0.0; 3], vec![0.0; 3]],
        )
        .unwrap();
        let result = evaluate_bands(&expr, &meta, &bands).unwrap();
        assert_eq!(result.data, vec![0.0, 0.0, 0.0]);
        // Only the finite log(1) = 0 counts towards the statistics.
        assert_eq!(result.min, 0.0);
        assert_eq!(result.max, 0.0);
    }

    #[test]
    fn test_masked_pixels_are_nan_and_skipped() {
        let meta = BandMetadata::resolve(3, None);
        let expr = CompiledExpression::compile("red * 10").unwrap();
        let bands = BandSet::with_mask(
            2,
            1,
            vec![vec![1.0, 5.0], vec![0.0; 2], vec![0.0; 2]],
            vec![true, false],
        )
        .unwrap();
        let result = evaluate_bands(&expr, &meta, &bands).unwrap();
        assert_eq!(result.data[0], 10.0);
        assert!(result.data[1].is_nan());
        assert_eq!(result.max, 10.0);
    }

    #[test]
    fn test_band_length_mismatch() {
        assert!(BandSet::new(2, 2, vec![vec![0.0; 3]]).is_err());
    }
}
