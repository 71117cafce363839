//! Application state and shared resources.

use metrics_exporter_prometheus::PrometheusHandle;
use projection::{PointProjector, Proj4Projector};
use std::sync::Arc;
use std::time::Instant;
use storage::{DatasetCache, GeoTiffOpener, RasterOpener};

use crate::config::ServerConfig;
use crate::rendering::TileRenderer;

/// Shared application state.
pub struct AppState {
    pub config: ServerConfig,
    pub cache: Arc<DatasetCache>,
    pub renderer: TileRenderer,
    pub prometheus: PrometheusHandle,
    started: Instant,
}

impl AppState {
    /// State backed by GeoTIFF files under the configured data directory.
    pub fn new(config: ServerConfig, prometheus: PrometheusHandle) -> Self {
        Self::with_opener(config, Arc::new(GeoTiffOpener), prometheus)
    }

    /// State with a custom raster opener.
    pub fn with_opener(
        config: ServerConfig,
        opener: Arc<dyn RasterOpener>,
        prometheus: PrometheusHandle,
    ) -> Self {
        let projector: Arc<dyn PointProjector> = Arc::new(Proj4Projector::new());
        let cache = Arc::new(DatasetCache::new(
            config.data_dir.clone(),
            config.default_dataset.clone(),
            opener,
            Arc::clone(&projector),
        ));
        Self {
            renderer: TileRenderer::new(projector),
            cache,
            config,
            prometheus,
            started: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}
