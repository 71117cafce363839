//! Shared fixtures: an in-memory opener and app state over it.

#![allow(dead_code)]

use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::Path;
use std::sync::Arc;
use storage::{InMemoryRaster, RasterError, RasterOpener, RasterSource};
use tile_api::config::ServerConfig;
use tile_api::state::AppState;
use tile_common::tile::latlon_to_tile;
use tile_common::{CrsCode, GeoTransform, TileCoord};

/// Rasters cover lon 10..11, lat 45..46 at 0.005 degrees per pixel.
pub const WIDTH: usize = 200;
pub const HEIGHT: usize = 200;

pub const RED: f32 = 0.1;
pub const NIR: f32 = 0.5;

/// Serves fixed rasters by file name:
/// - `field.tif`: 4 bands (Red, Green, Blue, NIR) of reflectance
/// - `rgb.tif`: 3 bytes-range bands
/// - anything else: not found
pub struct FixtureOpener;

#[async_trait]
impl RasterOpener for FixtureOpener {
    async fn open(&self, path: &Path) -> Result<Arc<dyn RasterSource>, RasterError> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let transform = GeoTransform::new(10.0, 46.0, 0.005, -0.005, CrsCode::wgs84());
        let plane = |v: f32| vec![v; WIDTH * HEIGHT];
        let raster = match name {
            "field.tif" => InMemoryRaster::new(
                WIDTH,
                HEIGHT,
                transform,
                vec![plane(RED), plane(0.2), plane(0.05), plane(NIR)],
            )?,
            "rgb.tif" => InMemoryRaster::new(
                WIDTH,
                HEIGHT,
                transform,
                vec![plane(30.0), plane(60.0), plane(40.0)],
            )?,
            _ => return Err(RasterError::NotFound(path.to_path_buf())),
        };
        Ok(Arc::new(raster))
    }
}

pub fn config() -> ServerConfig {
    ServerConfig {
        data_dir: "/data".into(),
        default_dataset: "field.tif".to_string(),
        ..ServerConfig::default()
    }
}

pub fn state() -> Arc<AppState> {
    let handle = PrometheusBuilder::new().build_recorder().handle();
    Arc::new(AppState::with_opener(config(), Arc::new(FixtureOpener), handle))
}

/// A z12 tile well inside the rasters.
pub fn inside_tile() -> TileCoord {
    latlon_to_tile(45.5, 10.5, 12)
}

/// A tile on the other side of the world.
pub fn outside_tile() -> TileCoord {
    latlon_to_tile(-30.0, 100.0, 12)
}

/// A z9 tile whose column and row only hit the rasters at z8.
pub fn off_by_one_zoom_tile() -> TileCoord {
    let above = latlon_to_tile(45.5, 10.5, 8);
    TileCoord::new(9, above.x, above.y)
}
