//! Dataset storage for the tile service.
//!
//! Provides:
//! - Raster access traits with an in-memory implementation
//! - A GeoTIFF reader built on the `tiff` crate
//! - The process-wide dataset cache with idle eviction

pub mod dataset_cache;
pub mod geotiff;
pub mod raster;

pub use dataset_cache::{DatasetCache, DatasetCacheStats, DatasetEntry, DatasetInfo};
pub use geotiff::{list_available, resolve_dataset_path, GeoTiffOpener};
pub use raster::{InMemoryRaster, RasterError, RasterInfo, RasterOpener, RasterSource, WindowData};
