//! Scalar and multi-band grids to RGBA pixels.
//!
//! All renderers emit a row-major RGBA8 buffer of `width * height * 4` bytes.
//! Pixels with no data (NaN, or masked out) are fully transparent.

use crate::colormap::{normalize, Lut};
use rayon::prelude::*;

/// RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Render a scalar grid by normalizing each value into `[min, max]` and
/// passing it to `color_fn`.
///
/// NaN cells stay transparent.
pub fn render_grid<F>(
    data: &[f32],
    width: usize,
    height: usize,
    min: f64,
    max: f64,
    color_fn: F,
) -> Vec<u8>
where
    F: Fn(f64) -> Color + Sync,
{
    let mut pixels = vec![0u8; width * height * 4];
    if width == 0 {
        return pixels;
    }

    pixels
        .par_chunks_mut(width * 4)
        .zip(data.par_chunks(width))
        .for_each(|(out, row)| {
            for (px, value) in out.chunks_exact_mut(4).zip(row) {
                if value.is_nan() {
                    continue;
                }
                let color = color_fn(normalize(f64::from(*value), min, max));
                px.copy_from_slice(&color.to_array());
            }
        });

    pixels
}

/// Render a scalar grid through a colormap LUT.
pub fn render_with_lut(
    data: &[f32],
    width: usize,
    height: usize,
    min: f64,
    max: f64,
    lut: &Lut,
) -> Vec<u8> {
    render_grid(data, width, height, min, max, |v| lut.lookup(v))
}

/// VARI range mapped onto the heat ramp.
pub const VARI_RANGE: (f64, f64) = (0.0, 0.3);

/// Dark red through yellow to green for a normalized VARI value.
pub fn vari_color(normalized: f64) -> Color {
    let n = normalized.clamp(0.0, 1.0);
    if n > 0.6 {
        Color::rgb((255.0 * (1.0 - n)).round() as u8, 255, 0)
    } else if n > 0.3 {
        Color::rgb(255, (255.0 * (n / 0.6)).round() as u8, 0)
    } else {
        Color::rgb((255.0 * n * 2.0).round() as u8, 0, 0)
    }
}

/// Render a VARI grid with the fixed heat ramp.
pub fn render_vari(data: &[f32], width: usize, height: usize) -> Vec<u8> {
    render_grid(data, width, height, VARI_RANGE.0, VARI_RANGE.1, vari_color)
}

/// How a raw band is brought into 0..=255 for true-color output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelScale {
    /// Samples already in byte range.
    Passthrough,
    /// Linear stretch of `[min, max]` onto 0..=255.
    Linear { min: f64, max: f64 },
}

impl ChannelScale {
    /// Pick a scale for a band: passthrough if every valid sample fits in a
    /// byte, otherwise a min/max stretch.
    pub fn for_band(band: &[f32], valid: &[bool]) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for (v, ok) in band.iter().zip(valid) {
            if *ok && v.is_finite() {
                min = min.min(f64::from(*v));
                max = max.max(f64::from(*v));
            }
        }
        if !min.is_finite() || (min >= 0.0 && max <= 255.0) {
            ChannelScale::Passthrough
        } else {
            ChannelScale::Linear { min, max }
        }
    }

    #[inline]
    pub fn apply(&self, value: f32) -> u8 {
        if !value.is_finite() {
            return 0;
        }
        match *self {
            ChannelScale::Passthrough => value.round().clamp(0.0, 255.0) as u8,
            ChannelScale::Linear { min, max } => {
                (normalize(f64::from(value), min, max) * 255.0).round() as u8
            }
        }
    }
}

/// Interleave three bands into RGBA, masking invalid pixels.
pub fn render_rgb(
    bands: [&[f32]; 3],
    valid: &[bool],
    width: usize,
    height: usize,
) -> Vec<u8> {
    let scales = bands.map(|band| ChannelScale::for_band(band, valid));
    let mut pixels = vec![0u8; width * height * 4];

    pixels
        .par_chunks_mut(4)
        .enumerate()
        .for_each(|(i, px)| {
            if !valid.get(i).copied().unwrap_or(false) {
                return;
            }
            for (c, (band, scale)) in bands.iter().zip(&scales).enumerate() {
                px[c] = band.get(i).map(|v| scale.apply(*v)).unwrap_or(0);
            }
            px[3] = 255;
        });

    pixels
}
