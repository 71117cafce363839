//! Named colormaps, value normalization and precomputed lookup tables.
//!
//! A colormap is an ordered list of RGB control points spread evenly over
//! `[0, 1]`. Values in between are interpolated linearly per channel.

use crate::gradient::Color;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::warn;

/// Colormap used when the requested one does not exist.
pub const FALLBACK_COLORMAP: &str = "viridis";

/// Default low/high percentiles for stretching free formulas.
pub const DEFAULT_PERCENTILES: (f64, f64) = (2.0, 98.0);

/// Odd so that 0.5 lands exactly on a table entry.
pub const DEFAULT_LUT_RESOLUTION: usize = 257;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ColorMap {
    pub name: &'static str,
    #[serde(skip)]
    stops: &'static [[u8; 3]],
}

pub static COLORMAPS: &[ColorMap] = &[
    ColorMap {
        name: "viridis",
        stops: &[[68, 1, 84], [59, 82, 139], [33, 145, 140], [94, 201, 98], [253, 231, 37]],
    },
    ColorMap {
        name: "plasma",
        stops: &[[13, 8, 135], [126, 3, 168], [204, 71, 120], [248, 149, 64], [240, 249, 33]],
    },
    ColorMap {
        name: "inferno",
        stops: &[[0, 0, 4], [87, 16, 110], [188, 55, 84], [249, 142, 9], [252, 255, 164]],
    },
    ColorMap {
        name: "magma",
        stops: &[[0, 0, 4], [81, 18, 124], [183, 55, 121], [251, 136, 97], [252, 253, 191]],
    },
    ColorMap {
        name: "cividis",
        stops: &[[0, 32, 76], [0, 90, 124], [122, 135, 124], [213, 181, 118], [255, 233, 69]],
    },
    ColorMap {
        name: "RdYlGn",
        stops: &[
            [165, 0, 38],
            [215, 48, 39],
            [252, 141, 89],
            [254, 224, 139],
            [217, 239, 139],
            [166, 217, 106],
            [26, 152, 80],
            [0, 104, 55],
        ],
    },
    ColorMap {
        name: "RdYlBu",
        stops: &[
            [165, 0, 38],
            [215, 48, 39],
            [244, 109, 67],
            [253, 174, 97],
            [254, 224, 144],
            [224, 243, 248],
            [171, 217, 233],
            [116, 173, 209],
            [69, 117, 180],
            [49, 54, 149],
        ],
    },
    ColorMap {
        name: "Spectral",
        stops: &[
            [158, 1, 66],
            [213, 62, 79],
            [244, 109, 67],
            [253, 174, 97],
            [254, 224, 139],
            [230, 245, 152],
            [171, 221, 164],
            [102, 194, 165],
            [50, 136, 189],
            [94, 79, 162],
        ],
    },
    ColorMap {
        name: "Greys",
        stops: &[[0, 0, 0], [64, 64, 64], [128, 128, 128], [192, 192, 192], [255, 255, 255]],
    },
    ColorMap {
        name: "terrain",
        stops: &[[51, 102, 153], [102, 153, 102], [153, 153, 102], [204, 153, 102], [255, 255, 255]],
    },
    ColorMap {
        name: "ndvi",
        stops: &[
            [165, 0, 38],
            [215, 88, 39],
            [244, 165, 89],
            [254, 224, 139],
            [217, 239, 139],
            [166, 217, 106],
            [102, 194, 165],
            [26, 152, 80],
            [0, 104, 55],
        ],
    },
];

/// Case-insensitive lookup.
pub fn get_colormap(name: &str) -> Option<&'static ColorMap> {
    let name = name.trim();
    COLORMAPS.iter().find(|c| c.name.eq_ignore_ascii_case(name))
}

/// Look up a colormap, falling back to viridis for unknown names.
pub fn colormap_or_default(name: &str) -> &'static ColorMap {
    match get_colormap(name) {
        Some(cmap) => cmap,
        None => {
            warn!(colormap = %name, fallback = FALLBACK_COLORMAP, "Unknown colormap");
            &COLORMAPS[0]
        }
    }
}

pub fn colormap_names() -> Vec<&'static str> {
    COLORMAPS.iter().map(|c| c.name).collect()
}

impl ColorMap {
    pub fn stops(&self) -> &'static [[u8; 3]] {
        self.stops
    }

    /// Color for a normalized value. Input is clamped to `[0, 1]`; NaN maps to 0.
    pub fn color_at(&self, value: f64) -> Color {
        let n = self.stops.len();
        if n == 0 {
            return Color::rgb(128, 128, 128);
        }
        let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        let scaled = v * (n - 1) as f64;
        let lo = scaled.floor() as usize;
        let hi = (scaled.ceil() as usize).min(n - 1);
        if lo >= hi {
            let [r, g, b] = self.stops[lo.min(n - 1)];
            return Color::rgb(r, g, b);
        }

        let t = scaled - lo as f64;
        let [r1, g1, b1] = self.stops[lo];
        let [r2, g2, b2] = self.stops[hi];
        let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Color::rgb(lerp(r1, r2), lerp(g1, g2), lerp(b1, b2))
    }
}

/// How scalar values are mapped onto `[0, 1]` before the colormap lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stretch {
    Fixed { min: f64, max: f64 },
    Percentile { low: f64, high: f64 },
}

impl Default for Stretch {
    fn default() -> Self {
        Stretch::Percentile {
            low: DEFAULT_PERCENTILES.0,
            high: DEFAULT_PERCENTILES.1,
        }
    }
}

impl Stretch {
    /// Resolve to a concrete `(min, max)` for the given data.
    pub fn bounds(&self, data: &[f32]) -> (f64, f64) {
        match *self {
            Stretch::Fixed { min, max } => (min, max),
            Stretch::Percentile { low, high } => percentile_bounds(data, low, high),
        }
    }
}

/// Values at the `low` and `high` percentiles of the finite entries of `data`.
///
/// Returns `(0, 1)` when there are no finite values. The result always has
/// `min <= max`.
pub fn percentile_bounds(data: &[f32], low: f64, high: f64) -> (f64, f64) {
    let mut sorted: Vec<f32> = data.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return (0.0, 1.0);
    }
    sorted.sort_unstable_by(f32::total_cmp);

    let (low, high) = if low > high { (high, low) } else { (low, high) };
    let rank = |p: f64| {
        let idx = (p.clamp(0.0, 100.0) * sorted.len() as f64 / 100.0).floor() as usize;
        f64::from(sorted[idx.min(sorted.len() - 1)])
    };
    (rank(low), rank(high))
}

/// Map `value` into `[0, 1]` given a fixed range. A degenerate range gives 0.5.
#[inline]
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    let span = max - min;
    if span == 0.0 || !span.is_finite() {
        return 0.5;
    }
    ((value - min) / span).clamp(0.0, 1.0)
}

/// A colormap sampled at `resolution` evenly spaced points.
#[derive(Debug, Clone)]
pub struct Lut {
    colors: Vec<Color>,
}

impl Lut {
    pub fn build(cmap: &ColorMap, resolution: usize) -> Self {
        let resolution = resolution.max(2);
        let last = (resolution - 1) as f64;
        let colors = (0..resolution)
            .map(|i| cmap.color_at(i as f64 / last))
            .collect();
        Self { colors }
    }

    pub fn resolution(&self) -> usize {
        self.colors.len()
    }

    /// Color for a normalized value, picking the nearest table entry.
    #[inline]
    pub fn lookup(&self, value: f64) -> Color {
        let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        let idx = (v * (self.colors.len() - 1) as f64).round() as usize;
        self.colors[idx.min(self.colors.len() - 1)]
    }
}

/// Shared LUTs keyed by `(colormap name, resolution)`.
#[derive(Debug, Default)]
pub struct LutCache {
    tables: RwLock<HashMap<(&'static str, usize), Arc<Lut>>>,
}

impl LutCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, cmap: &'static ColorMap, resolution: usize) -> Arc<Lut> {
        let key = (cmap.name, resolution);
        if let Ok(tables) = self.tables.read() {
            if let Some(lut) = tables.get(&key) {
                return Arc::clone(lut);
            }
        }

        let lut = Arc::new(Lut::build(cmap, resolution));
        match self.tables.write() {
            Ok(mut tables) => Arc::clone(tables.entry(key).or_insert(lut)),
            Err(_) => lut,
        }
    }

    pub fn len(&self) -> usize {
        self.tables.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(get_colormap("rdylgn").map(|c| c.name), Some("RdYlGn"));
        assert_eq!(get_colormap("GREYS").map(|c| c.name), Some("Greys"));
        assert!(get_colormap("jet").is_none());
        assert_eq!(colormap_or_default("jet").name, "viridis");
    }

    #[test]
    fn test_interpolation_rounds() {
        let greys = get_colormap("Greys").unwrap();
        // Halfway between 0 and 64
        assert_eq!(greys.color_at(0.125), Color::rgb(32, 32, 32));
        // 0.1 * 4 = 0.4 of the first segment: 25.6 -> 26
        assert_eq!(greys.color_at(0.1), Color::rgb(26, 26, 26));
    }

    #[test]
    fn test_percentile_bounds_swaps_inverted() {
        let data: Vec<f32> = (0..100).map(|i| i as f32).collect();
        assert_eq!(percentile_bounds(&data, 98.0, 2.0), (2.0, 98.0));
        assert_eq!(percentile_bounds(&data, 0.0, 100.0), (0.0, 99.0));
    }

    #[test]
    fn test_percentile_ignores_non_finite() {
        let data = [f32::NAN, 1.0, f32::INFINITY, 3.0];
        let (lo, hi) = percentile_bounds(&data, 0.0, 100.0);
        assert_eq!((lo, hi), (1.0, 3.0));
        assert_eq!(percentile_bounds(&[f32::NAN], 2.0, 98.0), (0.0, 1.0));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(5.0, 0.0, 10.0), 0.5);
        assert_eq!(normalize(-5.0, 0.0, 10.0), 0.0);
        assert_eq!(normalize(50.0, 0.0, 10.0), 1.0);
        assert_eq!(normalize(3.0, 3.0, 3.0), 0.5);
    }

    #[test]
    fn test_lut_cache_shares_tables() {
        let cache = LutCache::new();
        let cmap = get_colormap("viridis").unwrap();
        let a = cache.get(cmap, 256);
        let b = cache.get(cmap, 256);
        assert!(Arc::ptr_eq(&a, &b));
        let c = cache.get(cmap, 64);
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);
        assert_eq!(a.lookup(0.0), Color::rgb(68, 1, 84));
        assert_eq!(a.lookup(1.0), Color::rgb(253, 231, 37));
    }
}
