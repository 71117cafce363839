//! Tile address to raster pixel window resolution.

use projection::PointProjector;
use tile_common::grid::PixelExtent;
use tile_common::tile::{tile_range_for_bbox, tile_to_latlon_bounds};
use tile_common::{BoundingBox, CrsCode, GeoTransform, PixelWindow, TileCoord, TileError, TileResult};
use tracing::info;

/// Georeferencing of the raster a tile is resolved against.
#[derive(Debug, Clone, Copy)]
pub struct RasterGrid {
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
    /// Raster extent in WGS84 lon/lat
    pub geographic_bounds: BoundingBox,
}

/// Where a tile lands in the source raster.
#[derive(Debug, Clone, Copy)]
pub struct TileWindow {
    pub requested: TileCoord,
    /// Tile actually rendered; differs from `requested` after zoom recovery
    pub effective: TileCoord,
    /// Tile envelope in the raster's native CRS
    pub native_bounds: BoundingBox,
    /// Unclamped fractional pixel envelope of the tile
    pub extent: PixelExtent,
    /// Pixels to read, clamped to the raster
    pub window: PixelWindow,
}

impl TileWindow {
    pub fn zoom_corrected(&self) -> bool {
        self.requested != self.effective
    }

    /// Value of the `X-Zoom-Corrected` header.
    pub fn correction_label(&self) -> String {
        format!("{}->{}", self.requested, self.effective)
    }
}

/// Step a tile up one zoom level when it misses the raster at its own zoom
/// but the same column and row hit it one level up.
///
/// Clients that are off by one zoom level still get imagery. Never goes more
/// than one level.
pub fn recover_zoom(coord: TileCoord, geographic_bounds: &BoundingBox) -> TileCoord {
    if tile_range_for_bbox(geographic_bounds, coord.z).contains(&coord) {
        return coord;
    }
    match coord.same_index_above() {
        Some(above) if tile_range_for_bbox(geographic_bounds, above.z).contains(&above) => above,
        _ => coord,
    }
}

/// Tile envelope in `crs`, reprojecting the four corners when needed.
pub fn tile_bounds_in(
    coord: &TileCoord,
    crs: CrsCode,
    projector: &dyn PointProjector,
) -> TileResult<BoundingBox> {
    let geographic = tile_to_latlon_bounds(coord);
    if crs.is_geographic() {
        return Ok(geographic);
    }
    let mut corners = geographic.corners();
    projector.project(CrsCode::wgs84(), crs, &mut corners)?;
    BoundingBox::enclosing(&corners)
        .ok_or_else(|| TileError::generation(format!("Tile {} has no finite extent in {}", coord, crs)))
}

/// Resolve a tile to the pixel window it covers.
///
/// Fails with `NoCoverage` when the window is empty after clamping.
pub fn resolve_tile_window(
    coord: TileCoord,
    grid: &RasterGrid,
    projector: &dyn PointProjector,
) -> TileResult<TileWindow> {
    let effective = recover_zoom(coord, &grid.geographic_bounds);
    if effective != coord {
        info!(requested = %coord, effective = %effective, "Zoom corrected");
    }

    let native_bounds = tile_bounds_in(&effective, grid.transform.crs, projector)?;
    let extent = grid.transform.bbox_to_pixels(&native_bounds);
    let window = extent.to_window(grid.width, grid.height);
    if window.is_empty() {
        return Err(TileError::NoCoverage);
    }

    Ok(TileWindow {
        requested: coord,
        effective,
        native_bounds,
        extent,
        window,
    })
}
