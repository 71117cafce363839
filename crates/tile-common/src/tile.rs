//! XYZ web map tile addressing.

use crate::{BoundingBox, TileError, TileResult};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Latitude limit of the square Web Mercator world.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// A tile coordinate (z/x/y), XYZ convention with the origin at the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Parse and validate raw path segments.
    ///
    /// Rejects non-integers, negative values, zoom above `max_zoom` and
    /// column/row outside `0..2^z`.
    pub fn parse(z: &str, x: &str, y: &str, max_zoom: u32) -> TileResult<Self> {
        let invalid = |reason: String| TileError::InvalidTileCoordinate {
            z: z.to_string(),
            x: x.to_string(),
            y: y.to_string(),
            max_zoom,
            reason,
        };

        let parse = |name: &str, raw: &str| -> TileResult<u32> {
            raw.trim()
                .parse::<u32>()
                .map_err(|_| invalid(format!("{} must be a non-negative integer", name)))
        };

        let coord = TileCoord::new(parse("z", z)?, parse("x", x)?, parse("y", y)?);
        if coord.z > max_zoom {
            return Err(invalid(format!("zoom must be between 0 and {}", max_zoom)));
        }
        let n = coord.matrix_size();
        if u64::from(coord.x) >= n || u64::from(coord.y) >= n {
            return Err(invalid(format!(
                "x and y must be between 0 and {} at zoom {}",
                n - 1,
                coord.z
            )));
        }
        Ok(coord)
    }

    /// Number of columns (and rows) at this zoom.
    pub fn matrix_size(&self) -> u64 {
        1u64 << self.z
    }

    /// The same column/row one zoom level up.
    ///
    /// Unlike a quadtree parent this keeps x and y unchanged; it is only
    /// meaningful when x and y are still valid at `z - 1`.
    pub fn same_index_above(&self) -> Option<TileCoord> {
        if self.z == 0 {
            return None;
        }
        let candidate = TileCoord::new(self.z - 1, self.x, self.y);
        let n = candidate.matrix_size();
        if u64::from(self.x) < n && u64::from(self.y) < n {
            Some(candidate)
        } else {
            None
        }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Inclusive range of tile columns and rows at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub z: u32,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl TileRange {
    pub fn contains(&self, coord: &TileCoord) -> bool {
        coord.z == self.z
            && coord.x >= self.min_x
            && coord.x <= self.max_x
            && coord.y >= self.min_y
            && coord.y <= self.max_y
    }
}

/// Convert lat/lon to the Web Mercator tile containing it.
///
/// Latitude is clamped to the Mercator limit and the result to the grid.
pub fn latlon_to_tile(lat: f64, lon: f64, zoom: u32) -> TileCoord {
    let n = (1u64 << zoom) as f64;
    let max_index = (1u64 << zoom) - 1;

    let lat_rad = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let x = ((lon + 180.0) / 360.0 * n).floor();
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor();

    let to_index = |v: f64| (v.max(0.0) as u64).min(max_index) as u32;
    TileCoord {
        z: zoom,
        x: to_index(x),
        y: to_index(y),
    }
}

/// Convert Web Mercator tile coordinates to WGS84 lon/lat bounds.
pub fn tile_to_latlon_bounds(coord: &TileCoord) -> BoundingBox {
    let n = coord.matrix_size() as f64;

    let lon_min = coord.x as f64 / n * 360.0 - 180.0;
    let lon_max = (coord.x as f64 + 1.0) / n * 360.0 - 180.0;

    let lat_max = (PI * (1.0 - 2.0 * coord.y as f64 / n))
        .sinh()
        .atan()
        .to_degrees();
    let lat_min = (PI * (1.0 - 2.0 * (coord.y as f64 + 1.0) / n))
        .sinh()
        .atan()
        .to_degrees();

    BoundingBox::new(lon_min, lat_min, lon_max, lat_max)
}

/// Tiles at `zoom` that cover a WGS84 bounding box.
pub fn tile_range_for_bbox(bbox: &BoundingBox, zoom: u32) -> TileRange {
    let top_left = latlon_to_tile(bbox.max_y, bbox.min_x, zoom);
    let bottom_right = latlon_to_tile(bbox.min_y, bbox.max_x, zoom);
    TileRange {
        z: zoom,
        min_x: top_left.x,
        min_y: top_left.y,
        max_x: bottom_right.x,
        max_y: bottom_right.y,
    }
}
