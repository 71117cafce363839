//! Nearest-neighbour resampling of a raster window onto the output tile grid.

use super::window::TileWindow;
use band_math::BandSet;
use storage::WindowData;
use tile_common::{GeoTransform, PixelWindow, TileError, TileResult};

/// Precomputed source offset for every output pixel.
///
/// Offsets index into the row-major window buffers returned by the raster.
/// `None` marks output pixels that fall outside the raster.
#[derive(Debug, Clone)]
pub struct SamplePlan {
    size: usize,
    window: PixelWindow,
    offsets: Vec<Option<usize>>,
}

impl SamplePlan {
    /// Map each of the `size * size` output pixel centres into the window.
    pub fn new(tile: &TileWindow, transform: &GeoTransform, size: usize) -> Self {
        let window = tile.window;
        let extent = tile.extent;

        // Output row 0 is north and column 0 is west, whatever the raster's
        // axis directions are.
        let cols = axis_map(
            size,
            extent.min_x,
            extent.max_x,
            transform.pixel_width < 0.0,
            window.min_x,
            window.max_x,
        );
        let rows = axis_map(
            size,
            extent.min_y,
            extent.max_y,
            transform.pixel_height > 0.0,
            window.min_y,
            window.max_y,
        );

        let stride = window.width();
        let mut offsets = Vec::with_capacity(size * size);
        for row in &rows {
            for col in &cols {
                offsets.push(match (row, col) {
                    (Some(r), Some(c)) => Some(r * stride + c),
                    _ => None,
                });
            }
        }

        Self {
            size,
            window,
            offsets,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn window(&self) -> PixelWindow {
        self.window
    }

    pub fn covered_pixels(&self) -> usize {
        self.offsets.iter().filter(|o| o.is_some()).count()
    }

    /// Gather band samples onto the tile grid.
    ///
    /// A pixel is invalid when it lies outside the raster, or when any band
    /// holds NaN or the nodata value there.
    pub fn sample(&self, data: &WindowData, nodata: Option<f64>) -> TileResult<BandSet> {
        let expected = self.window.len();
        if let Some(bad) = data.bands.iter().position(|b| b.len() != expected) {
            return Err(TileError::generation(format!(
                "window band {} has {} samples, expected {}",
                bad,
                data.bands[bad].len(),
                expected
            )));
        }

        let nodata = nodata.map(|v| v as f32);
        let len = self.size * self.size;
        let mut bands = vec![vec![f32::NAN; len]; data.bands.len()];
        let mut valid = vec![false; len];

        for (pixel, offset) in self.offsets.iter().enumerate() {
            let Some(offset) = *offset else { continue };
            let mut ok = true;
            for (out, source) in bands.iter_mut().zip(&data.bands) {
                let v = source[offset];
                if v.is_nan() || Some(v) == nodata {
                    ok = false;
                }
                out[pixel] = v;
            }
            valid[pixel] = ok;
        }

        BandSet::with_mask(self.size, self.size, bands, valid)
    }
}

/// Window-relative source index for each of `size` output cells along one axis.
fn axis_map(
    size: usize,
    min: f64,
    max: f64,
    reversed: bool,
    window_min: usize,
    window_max: usize,
) -> Vec<Option<usize>> {
    let span = max - min;
    (0..size)
        .map(|i| {
            let t = (i as f64 + 0.5) / size as f64;
            let pos = if reversed { max - t * span } else { min + t * span };
            let idx = pos.floor();
            if !idx.is_finite() || idx < window_min as f64 || idx >= window_max as f64 {
                None
            } else {
                Some(idx as usize - window_min)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tile_common::grid::PixelExtent;
    use tile_common::{BoundingBox, CrsCode, TileCoord};

    fn tile(extent: PixelExtent, raster: (usize, usize)) -> TileWindow {
        TileWindow {
            requested: TileCoord::new(0, 0, 0),
            effective: TileCoord::new(0, 0, 0),
            native_bounds: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            extent,
            window: extent.to_window(raster.0, raster.1),
        }
    }

    fn north_up() -> GeoTransform {
        GeoTransform::new(0.0, 4.0, 1.0, -1.0, CrsCode::wgs84())
    }

    #[test]
    fn test_exact_window_is_identity() {
        let extent = PixelExtent { min_x: 0.0, min_y: 0.0, max_x: 4.0, max_y: 4.0 };
        let plan = SamplePlan::new(&tile(extent, (4, 4)), &north_up(), 4);
        let data = WindowData {
            window: plan.window(),
            bands: vec![(0..16).map(|v| v as f32).collect()],
        };
        let set = plan.sample(&data, None).unwrap();
        assert_eq!(set.band(0).unwrap(), (0..16).map(|v| v as f32).collect::<Vec<_>>().as_slice());
        assert!(set.valid_mask().iter().all(|v| *v));
    }

    #[test]
    fn test_upsampling_repeats_source_pixels() {
        let extent = PixelExtent { min_x: 1.0, min_y: 1.0, max_x: 3.0, max_y: 3.0 };
        let plan = SamplePlan::new(&tile(extent, (4, 4)), &north_up(), 4);
        assert_eq!(plan.window(), PixelWindow::new(1, 1, 3, 3));
        let data = WindowData {
            window: plan.window(),
            bands: vec![vec![1.0, 2.0, 3.0, 4.0]],
        };
        let set = plan.sample(&data, None).unwrap();
        assert_eq!(
            set.band(0).unwrap(),
            &[1.0, 1.0, 2.0, 2.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0, 3.0, 3.0, 4.0, 4.0]
        );
    }

    #[test]
    fn test_pixels_outside_raster_are_invalid() {
        // Tile hangs off the left half of the raster
        let extent = PixelExtent { min_x: -2.0, min_y: 0.0, max_x: 2.0, max_y: 4.0 };
        let plan = SamplePlan::new(&tile(extent, (4, 4)), &north_up(), 4);
        assert_eq!(plan.covered_pixels(), 8);
        let data = WindowData {
            window: plan.window(),
            bands: vec![vec![5.0; 8]],
        };
        let set = plan.sample(&data, None).unwrap();
        assert_eq!(&set.valid_mask()[..4], &[false, false, true, true]);
        assert!(set.band(0).unwrap()[0].is_nan());
    }

    #[test]
    fn test_nodata_masks_pixel() {
        let extent = PixelExtent { min_x: 0.0, min_y: 0.0, max_x: 2.0, max_y: 1.0 };
        let plan = SamplePlan::new(&tile(extent, (2, 1)), &north_up(), 2);
        let data = WindowData {
            window: plan.window(),
            bands: vec![vec![0.0, 7.0], vec![3.0, 3.0]],
        };
        let set = plan.sample(&data, Some(0.0)).unwrap();
        // Top row maps to row 0 for both output rows
        assert_eq!(set.valid_mask(), &[false, true, false, true]);
    }

    #[test]
    fn test_south_up_raster_is_flipped() {
        let transform = GeoTransform::new(0.0, 0.0, 1.0, 1.0, CrsCode::wgs84());
        let extent = PixelExtent { min_x: 0.0, min_y: 0.0, max_x: 1.0, max_y: 2.0 };
        let plan = SamplePlan::new(&tile(extent, (1, 2)), &transform, 2);
        let data = WindowData {
            window: plan.window(),
            bands: vec![vec![10.0, 20.0]],
        };
        let set = plan.sample(&data, None).unwrap();
        assert_eq!(set.band(0).unwrap(), &[20.0, 20.0, 10.0, 10.0]);
    }
}
