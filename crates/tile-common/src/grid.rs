//! Raster grid georeferencing and pixel windows.

use crate::{BoundingBox, CrsCode};
use serde::Serialize;

/// Affine mapping between raster pixel space and ground coordinates.
///
/// `pixel_height` is negative for the usual north-up raster, where row 0 is
/// the northern edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoTransform {
    /// Ground X of the top-left pixel corner
    pub origin_x: f64,
    /// Ground Y of the top-left pixel corner
    pub origin_y: f64,
    /// Pixel size in X (ground units per column)
    pub pixel_width: f64,
    /// Pixel size in Y (ground units per row, signed)
    pub pixel_height: f64,
    /// Native coordinate reference
    pub crs: CrsCode,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64, crs: CrsCode) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            crs,
        }
    }

    /// Fractional pixel coordinates of a ground point.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// Ground coordinates of a (fractional) pixel position.
    pub fn pixel_to_geo(&self, px: f64, py: f64) -> (f64, f64) {
        (
            self.origin_x + px * self.pixel_width,
            self.origin_y + py * self.pixel_height,
        )
    }

    /// Extent of a `width` x `height` raster in native coordinates.
    pub fn native_bounds(&self, width: usize, height: usize) -> BoundingBox {
        let (x0, y0) = self.pixel_to_geo(0.0, 0.0);
        let (x1, y1) = self.pixel_to_geo(width as f64, height as f64);
        BoundingBox::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }

    /// Fractional pixel-space envelope of a ground-space box.
    ///
    /// The vertical resolution sign decides which edge maps to the top row.
    pub fn bbox_to_pixels(&self, bbox: &BoundingBox) -> PixelExtent {
        let (ax, ay) = self.geo_to_pixel(bbox.min_x, bbox.min_y);
        let (bx, by) = self.geo_to_pixel(bbox.max_x, bbox.max_y);
        PixelExtent {
            min_x: ax.min(bx),
            min_y: ay.min(by),
            max_x: ax.max(bx),
            max_y: ay.max(by),
        }
    }
}

/// Unclamped, fractional pixel envelope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelExtent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl PixelExtent {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Integer window covering this extent, clamped to the raster.
    ///
    /// The near edge is floored and the far edge is rounded up so a tile
    /// smaller than one source pixel still reads the pixel it falls in.
    pub fn to_window(&self, width: usize, height: usize) -> PixelWindow {
        let clamp = |v: f64, limit: usize| -> usize {
            if !v.is_finite() || v <= 0.0 {
                0
            } else if v >= limit as f64 {
                limit
            } else {
                v as usize
            }
        };
        PixelWindow {
            min_x: clamp(self.min_x.floor(), width),
            min_y: clamp(self.min_y.floor(), height),
            max_x: clamp(self.max_x.ceil(), width),
            max_y: clamp(self.max_y.ceil(), height),
        }
    }
}

/// Integer rectangle in raster pixel space, `[min, max)` on both axes and
/// always inside `[0, width] x [0, height]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelWindow {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
}

impl PixelWindow {
    pub fn new(min_x: usize, min_y: usize, max_x: usize, max_y: usize) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Window covering an entire raster.
    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> usize {
        self.max_x.saturating_sub(self.min_x)
    }

    pub fn height(&self) -> usize {
        self.max_y.saturating_sub(self.min_y)
    }

    pub fn len(&self) -> usize {
        self.width() * self.height()
    }

    /// A zero-area window means the request has no coverage.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}
