//! Process-wide cache of opened datasets.
//!
//! Entries are keyed by resolved file path and carry everything derived at
//! open time (georeferencing, band aliases, geographic bounds), so tile
//! requests never touch file headers. Entries idle for longer than the
//! configured age are removed by [`DatasetCache::sweep`]. There is no size cap.
//!
//! Concurrent misses on one key share a single open: the first caller opens
//! the raster and broadcasts the outcome to everyone who arrived meanwhile.

use crate::geotiff::resolve_dataset_path;
use crate::raster::{RasterOpener, RasterSource};
use band_math::BandMetadata;
use chrono::{DateTime, TimeZone, Utc};
use projection::PointProjector;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tile_common::{BoundingBox, CrsCode, GeoTransform, TileError, TileResult};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

/// Dataset ids that resolve to the configured default dataset.
pub const DEFAULT_ALIASES: [&str; 2] = ["default", "_default"];

type OpenOutcome = Result<Arc<DatasetEntry>, TileError>;

/// An opened dataset and its derived metadata.
pub struct DatasetEntry {
    pub id: String,
    pub path: PathBuf,
    pub raster: Arc<dyn RasterSource>,
    pub transform: GeoTransform,
    pub bands: BandMetadata,
    pub width: usize,
    pub height: usize,
    /// Raster extent in WGS84 lon/lat
    pub geographic_bounds: BoundingBox,
    pub size_bytes: u64,
    pub loaded_at: DateTime<Utc>,
    /// Milliseconds since the Unix epoch
    last_access: AtomicI64,
}

impl DatasetEntry {
    pub fn crs(&self) -> CrsCode {
        self.transform.crs
    }

    pub fn nodata(&self) -> Option<f64> {
        self.raster.info().nodata
    }

    pub fn last_access(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.last_access.load(Ordering::Relaxed))
            .single()
            .unwrap_or(self.loaded_at)
    }

    fn touch(&self, now: DateTime<Utc>) {
        self.last_access.store(now.timestamp_millis(), Ordering::Relaxed);
    }

    fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        let idle_ms = now.timestamp_millis() - self.last_access.load(Ordering::Relaxed);
        Duration::from_millis(idle_ms.max(0) as u64)
    }

    pub fn info(&self) -> DatasetInfo {
        DatasetInfo {
            id: self.id.clone(),
            path: self.path.display().to_string(),
            width: self.width,
            height: self.height,
            band_count: self.bands.band_count(),
            band_names: self.bands.band_names(),
            bounds: self.geographic_bounds,
            crs: self.crs(),
            size_bytes: self.size_bytes,
            loaded_at: self.loaded_at,
            last_access: self.last_access(),
        }
    }
}

impl std::fmt::Debug for DatasetEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetEntry")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("crs", &self.transform.crs)
            .finish_non_exhaustive()
    }
}

/// Snapshot of a resident entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetInfo {
    pub id: String,
    pub path: String,
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub band_names: Vec<String>,
    pub bounds: BoundingBox,
    pub crs: CrsCode,
    pub size_bytes: u64,
    pub loaded_at: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
}

/// Counters for the health endpoint. Prometheus gets the same values
/// through the `metrics` facade.
#[derive(Debug, Default)]
pub struct DatasetCacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub opens: AtomicU64,
    pub evictions: AtomicU64,
}

impl DatasetCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64 * 100.0
        }
    }
}

pub struct DatasetCache {
    shared: Arc<Shared>,
}

/// State reachable from detached open tasks.
struct Shared {
    data_dir: PathBuf,
    default_dataset: String,
    opener: Arc<dyn RasterOpener>,
    projector: Arc<dyn PointProjector>,
    entries: RwLock<HashMap<String, Arc<DatasetEntry>>>,
    in_flight: Mutex<HashMap<String, broadcast::Sender<OpenOutcome>>>,
    stats: DatasetCacheStats,
}

impl DatasetCache {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        default_dataset: impl Into<String>,
        opener: Arc<dyn RasterOpener>,
        projector: Arc<dyn PointProjector>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                data_dir: data_dir.into(),
                default_dataset: default_dataset.into(),
                opener,
                projector,
                entries: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                stats: DatasetCacheStats::default(),
            }),
        }
    }

    pub fn stats(&self) -> &DatasetCacheStats {
        &self.shared.stats
    }

    /// Map a request id to its canonical id and file path.
    pub fn resolve(&self, id: &str) -> TileResult<(String, PathBuf)> {
        let id = id.trim();
        let id = if DEFAULT_ALIASES.iter().any(|a| a.eq_ignore_ascii_case(id)) {
            self.shared.default_dataset.as_str()
        } else {
            id
        };
        let path = resolve_dataset_path(&self.shared.data_dir, id).ok_or_else(|| {
            TileError::DatasetNotFound(format!("'{}' is not a dataset under the data directory", id))
        })?;
        Ok((id.to_string(), path))
    }

    fn key(path: &Path) -> String {
        path.display().to_string()
    }

    /// Return the cached entry for `id`, opening the dataset on a miss.
    ///
    /// The open runs on its own task and always publishes its outcome, so
    /// dropping the calling future neither cancels the open nor strands
    /// later callers.
    pub async fn get_or_open(&self, id: &str) -> TileResult<Arc<DatasetEntry>> {
        let (id, path) = self.resolve(id)?;
        let key = Self::key(&path);
        let shared = &self.shared;

        if let Some(entry) = shared.lookup(&key).await {
            return Ok(entry);
        }

        let mut rx = {
            let mut in_flight = shared.in_flight.lock().await;
            // The open task inserts before it clears its in-flight slot, so
            // this re-check under the lock cannot miss a just-finished open.
            if let Some(entry) = shared.lookup(&key).await {
                return Ok(entry);
            }
            match in_flight.get(&key) {
                Some(tx) => {
                    debug!(dataset = %id, "Waiting on in-flight open");
                    tx.subscribe()
                }
                None => {
                    let (tx, rx) = broadcast::channel(1);
                    in_flight.insert(key.clone(), tx);
                    shared.stats.misses.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!("dataset_cache_misses_total").increment(1);
                    tokio::spawn(Arc::clone(shared).open_and_publish(id.clone(), path, key));
                    rx
                }
            }
        };

        match rx.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(TileError::generation(format!(
                "Open of dataset '{}' was abandoned",
                id
            ))),
        }
    }

    /// Remove an entry. Returns whether it was resident.
    pub async fn evict(&self, id: &str) -> bool {
        let Ok((id, path)) = self.resolve(id) else {
            return false;
        };
        let removed = {
            let mut entries = self.shared.entries.write().await;
            let removed = entries.remove(&Self::key(&path));
            metrics::gauge!("dataset_cache_resident").set(entries.len() as f64);
            removed
        };
        match removed {
            Some(_) => {
                self.shared.stats.evictions.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("dataset_cache_evictions_total").increment(1);
                info!(dataset = %id, "Evicted dataset");
                true
            }
            None => false,
        }
    }

    pub async fn list_resident(&self) -> Vec<DatasetInfo> {
        let mut infos: Vec<DatasetInfo> = self
            .shared
            .entries
            .read()
            .await
            .values()
            .map(|entry| entry.info())
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    pub async fn resident_count(&self) -> usize {
        self.shared.entries.read().await.len()
    }

    /// Evict entries idle longer than `max_age`. Returns the evicted ids.
    pub async fn sweep(&self, max_age: Duration) -> Vec<String> {
        self.sweep_at(Utc::now(), max_age).await
    }

    pub async fn sweep_at(&self, now: DateTime<Utc>, max_age: Duration) -> Vec<String> {
        let (evicted, resident) = {
            let mut entries = self.shared.entries.write().await;
            let mut evicted = Vec::new();
            entries.retain(|_, entry| {
                let keep = entry.idle_for(now) <= max_age;
                if !keep {
                    evicted.push(entry.id.clone());
                }
                keep
            });
            (evicted, entries.len())
        };

        if !evicted.is_empty() {
            self.shared
                .stats
                .evictions
                .fetch_add(evicted.len() as u64, Ordering::Relaxed);
            metrics::counter!("dataset_cache_evictions_total").increment(evicted.len() as u64);
            metrics::gauge!("dataset_cache_resident").set(resident as f64);
            info!(evicted = ?evicted, resident, "Swept idle datasets");
        }
        evicted
    }
}

impl Shared {
    async fn lookup(&self, key: &str) -> Option<Arc<DatasetEntry>> {
        let entry = self.entries.read().await.get(key).cloned()?;
        entry.touch(Utc::now());
        self.stats.hits.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("dataset_cache_hits_total").increment(1);
        debug!(dataset = %entry.id, "Dataset cache hit");
        Some(entry)
    }

    /// Open, insert on success, then hand the outcome to every waiter.
    async fn open_and_publish(self: Arc<Self>, id: String, path: PathBuf, key: String) {
        let outcome = self.open_entry(&id, &path).await.map(Arc::new);
        if let Ok(entry) = &outcome {
            let resident = {
                let mut entries = self.entries.write().await;
                entries.insert(key.clone(), Arc::clone(entry));
                entries.len()
            };
            metrics::gauge!("dataset_cache_resident").set(resident as f64);
        }

        if let Some(tx) = self.in_flight.lock().await.remove(&key) {
            // Every waiter may have gone away; the entry is cached regardless
            let _ = tx.send(outcome);
        }
    }

    async fn open_entry(&self, id: &str, path: &Path) -> TileResult<DatasetEntry> {
        let started = std::time::Instant::now();
        let raster = self.opener.open(path).await.map_err(|e| {
            warn!(dataset = %id, path = %path.display(), error = %e, "Failed to open dataset");
            TileError::from(e)
        })?;
        self.stats.opens.fetch_add(1, Ordering::Relaxed);

        let info = raster.info().clone();
        let bands = BandMetadata::resolve(info.band_count, info.gdal_metadata.as_deref());
        let geographic_bounds = self.geographic_bounds(&info.transform, info.width, info.height)?;
        let now = Utc::now();

        info!(
            dataset = %id,
            path = %path.display(),
            width = info.width,
            height = info.height,
            bands = ?bands.band_names(),
            crs = %info.transform.crs,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Opened dataset"
        );

        Ok(DatasetEntry {
            id: id.to_string(),
            path: path.to_path_buf(),
            raster,
            transform: info.transform,
            bands,
            width: info.width,
            height: info.height,
            geographic_bounds,
            size_bytes: info.size_bytes,
            loaded_at: now,
            last_access: AtomicI64::new(now.timestamp_millis()),
        })
    }

    /// Native extent reprojected to WGS84 through its four corners.
    fn geographic_bounds(
        &self,
        transform: &GeoTransform,
        width: usize,
        height: usize,
    ) -> TileResult<BoundingBox> {
        let native = transform.native_bounds(width, height);
        if transform.crs.is_geographic() {
            return Ok(native);
        }
        let mut corners = native.corners();
        self.projector
            .project(transform.crs, CrsCode::wgs84(), &mut corners)?;
        BoundingBox::enclosing(&corners).ok_or_else(|| {
            TileError::generation(format!(
                "Dataset extent in {} does not reproject to WGS84",
                transform.crs
            ))
        })
    }
}
