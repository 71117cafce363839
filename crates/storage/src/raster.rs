//! Raster access abstractions.
//!
//! The dataset cache only sees these traits; the GeoTIFF reader is one
//! implementation and [`InMemoryRaster`] backs tests.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tile_common::{GeoTransform, PixelWindow, TileError};

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("Dataset not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("Raster is not georeferenced: {0}")]
    MissingGeoreference(PathBuf),

    #[error("Band {band} out of range, raster has {band_count} bands")]
    BandOutOfRange { band: usize, band_count: usize },

    #[error("Window {window:?} exceeds raster size {width}x{height}")]
    WindowOutOfRange {
        window: PixelWindow,
        width: usize,
        height: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Blocking task failed: {0}")]
    Join(String),
}

impl From<RasterError> for TileError {
    fn from(err: RasterError) -> Self {
        match err {
            RasterError::NotFound(path) => TileError::DatasetNotFound(path.display().to_string()),
            other => TileError::TileGenerationError(other.to_string()),
        }
    }
}

/// Static description of an opened raster.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RasterInfo {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub transform: GeoTransform,
    /// Raw GDAL_METADATA XML, used to recover band names
    #[serde(skip)]
    pub gdal_metadata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodata: Option<f64>,
    /// Approximate resident size of the decoded samples
    pub size_bytes: u64,
}

/// Samples for a pixel window, one row-major `Vec` per requested band.
#[derive(Debug, Clone)]
pub struct WindowData {
    pub window: PixelWindow,
    pub bands: Vec<Vec<f32>>,
}

/// An opened raster.
#[async_trait]
pub trait RasterSource: Send + Sync {
    fn info(&self) -> &RasterInfo;

    /// Read the given bands (0-based) over `window`.
    async fn read_window(
        &self,
        window: PixelWindow,
        bands: &[usize],
    ) -> Result<WindowData, RasterError>;
}

/// Opens rasters by path.
#[async_trait]
pub trait RasterOpener: Send + Sync {
    async fn open(&self, path: &Path) -> Result<Arc<dyn RasterSource>, RasterError>;
}

/// A raster held fully in memory as separate band planes.
#[derive(Debug, Clone)]
pub struct InMemoryRaster {
    info: RasterInfo,
    planes: Vec<Vec<f32>>,
}

impl InMemoryRaster {
    /// Build from band planes. Every plane must hold `width * height` samples.
    pub fn new(
        width: usize,
        height: usize,
        transform: GeoTransform,
        planes: Vec<Vec<f32>>,
    ) -> Result<Self, RasterError> {
        if let Some(bad) = planes.iter().position(|p| p.len() != width * height) {
            return Err(RasterError::Decode {
                path: PathBuf::from("<memory>"),
                message: format!(
                    "band {} has {} samples, expected {}",
                    bad,
                    planes[bad].len(),
                    width * height
                ),
            });
        }
        let size_bytes = (planes.len() * width * height * std::mem::size_of::<f32>()) as u64;
        Ok(Self {
            info: RasterInfo {
                width,
                height,
                band_count: planes.len(),
                transform,
                gdal_metadata: None,
                nodata: None,
                size_bytes,
            },
            planes,
        })
    }

    pub fn with_gdal_metadata(mut self, xml: impl Into<String>) -> Self {
        self.info.gdal_metadata = Some(xml.into());
        self
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.info.nodata = Some(nodata);
        self
    }

    /// Copy a window out of the planes.
    pub fn slice(&self, window: PixelWindow, bands: &[usize]) -> Result<WindowData, RasterError> {
        let RasterInfo { width, height, band_count, .. } = self.info;
        if window.max_x > width || window.max_y > height {
            return Err(RasterError::WindowOutOfRange { window, width, height });
        }
        if window.is_empty() {
            return Ok(WindowData {
                window,
                bands: vec![Vec::new(); bands.len()],
            });
        }

        let bands = bands
            .iter()
            .map(|&band| {
                let plane = self
                    .planes
                    .get(band)
                    .ok_or(RasterError::BandOutOfRange { band, band_count })?;
                let mut out = Vec::with_capacity(window.len());
                for row in window.min_y..window.max_y {
                    let start = row * width;
                    out.extend_from_slice(&plane[start + window.min_x..start + window.max_x]);
                }
                Ok(out)
            })
            .collect::<Result<Vec<_>, RasterError>>()?;

        Ok(WindowData { window, bands })
    }
}

#[async_trait]
impl RasterSource for InMemoryRaster {
    fn info(&self) -> &RasterInfo {
        &self.info
    }

    async fn read_window(
        &self,
        window: PixelWindow,
        bands: &[usize],
    ) -> Result<WindowData, RasterError> {
        self.slice(window, bands)
    }
}
