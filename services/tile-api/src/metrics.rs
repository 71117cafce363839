//! Request metrics recorded through the `metrics` facade.
//!
//! The Prometheus exporter installed in `main` renders everything recorded
//! here, plus the dataset cache series emitted by the storage crate.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram, Unit};
use serde::Serialize;
use std::time::Duration;

/// Which tile endpoint served a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TileKind {
    Index,
    TrueColor,
    Vari,
}

impl TileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TileKind::Index => "index",
            TileKind::TrueColor => "truecolor",
            TileKind::Vari => "vari",
        }
    }
}

/// Register descriptions so the exporter emits HELP lines.
pub fn describe() {
    describe_counter!("tile_requests_total", "Tile requests by endpoint kind");
    describe_counter!("tile_errors_total", "Failed tile requests by error kind");
    describe_histogram!(
        "tile_render_duration_ms",
        Unit::Milliseconds,
        "Time from request validation to encoded image"
    );
    describe_counter!("dataset_cache_hits_total", "Dataset cache hits");
    describe_counter!("dataset_cache_misses_total", "Dataset cache misses that opened a file");
    describe_counter!("dataset_cache_evictions_total", "Datasets evicted from the cache");
    describe_gauge!("dataset_cache_resident", "Datasets currently held in memory");
}

pub fn record_request(kind: TileKind) {
    counter!("tile_requests_total", "kind" => kind.as_str()).increment(1);
}

pub fn record_error(error_kind: &'static str) {
    counter!("tile_errors_total", "kind" => error_kind).increment(1);
}

pub fn record_render(kind: TileKind, elapsed: Duration) {
    histogram!("tile_render_duration_ms", "kind" => kind.as_str())
        .record(elapsed.as_secs_f64() * 1000.0);
}
