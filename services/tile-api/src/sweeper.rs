//! Background eviction of idle datasets.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use storage::DatasetCache;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::ServerConfig;

/// Configuration for the sweeper task.
#[derive(Debug, Clone, Copy)]
pub struct SweeperConfig {
    /// How often to sweep
    pub interval: Duration,
    /// Idle time after which an entry is evicted
    pub max_age: Duration,
}

impl From<&ServerConfig> for SweeperConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            interval: config.sweep_interval,
            max_age: config.cache_max_age,
        }
    }
}

/// Statistics from one sweep.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SweepStats {
    pub evicted: Vec<String>,
    pub resident: usize,
}

pub struct CacheSweeper {
    cache: Arc<DatasetCache>,
    config: SweeperConfig,
}

impl CacheSweeper {
    pub fn new(cache: Arc<DatasetCache>, config: SweeperConfig) -> Self {
        Self { cache, config }
    }

    /// Run one sweep.
    pub async fn run_once(&self) -> SweepStats {
        let evicted = self.cache.sweep(self.config.max_age).await;
        let resident = self.cache.resident_count().await;
        debug!(evicted = evicted.len(), resident, "Sweep complete");
        SweepStats { evicted, resident }
    }

    /// Sweep on every tick until `shutdown` flips to `true` or its sender
    /// is dropped.
    pub async fn run_until(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            max_age_secs = self.config.max_age.as_secs(),
            "Starting dataset cache sweeper"
        );

        let mut ticker = interval(self.config.interval.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing can be idle yet
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Dataset cache sweeper stopped");
    }
}
