//! Server configuration from environment variables.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Tile edge length bounds accepted from the `size` query parameter.
pub const MIN_TILE_SIZE: usize = 64;
pub const MAX_TILE_SIZE: usize = 1024;

/// Highest zoom the tile matrix arithmetic accepts.
pub const MAX_SUPPORTED_ZOOM: u32 = 30;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory scanned for `.tif`/`.tiff` datasets
    pub data_dir: PathBuf,
    /// Dataset served for the `default` and `_default` ids
    pub default_dataset: String,
    /// Idle time after which a resident dataset is evicted
    pub cache_max_age: Duration,
    pub sweep_interval: Duration,
    pub tile_size: usize,
    pub max_zoom: u32,
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            data_dir: PathBuf::from("./data"),
            default_dataset: "odm_orthophoto.tif".to_string(),
            cache_max_age: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(600),
            tile_size: 256,
            max_zoom: 22,
            cors_origin: "*".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let cache_minutes: u64 = parse_or(&lookup, "CACHE_AGE_MINUTES", 60);
        // The hour-based variable wins when both are set
        let cache_max_age = match lookup("MAX_CACHE_AGE_HOURS") {
            Some(_) => Duration::from_secs(parse_or::<u64, _>(&lookup, "MAX_CACHE_AGE_HOURS", 1) * 3600),
            None => Duration::from_secs(cache_minutes * 60),
        };

        let tile_size = parse_or(&lookup, "TILE_SIZE", defaults.tile_size);
        let tile_size = if (MIN_TILE_SIZE..=MAX_TILE_SIZE).contains(&tile_size) {
            tile_size
        } else {
            warn!(
                tile_size,
                min = MIN_TILE_SIZE,
                max = MAX_TILE_SIZE,
                "TILE_SIZE out of range, using default"
            );
            defaults.tile_size
        };

        let max_zoom = parse_or(&lookup, "MAX_ZOOM", defaults.max_zoom);
        let max_zoom = if max_zoom > MAX_SUPPORTED_ZOOM {
            warn!(max_zoom, limit = MAX_SUPPORTED_ZOOM, "MAX_ZOOM too high, clamping");
            MAX_SUPPORTED_ZOOM
        } else {
            max_zoom
        };

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port),
            data_dir: lookup("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            default_dataset: lookup("DEFAULT_DATASET").unwrap_or(defaults.default_dataset),
            cache_max_age,
            sweep_interval: Duration::from_secs(parse_or(
                &lookup,
                "CACHE_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval.as_secs(),
            )),
            tile_size,
            max_zoom,
            cors_origin: lookup("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
        }
    }

    /// `host:port` for binding when no explicit listen address is given.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!(key, value = %raw, error = %e, default = %default, "Invalid number, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]);
        assert_eq!(cfg.port, 3001);
        assert_eq!(cfg.default_dataset, "odm_orthophoto.tif");
        assert_eq!(cfg.cache_max_age, Duration::from_secs(3600));
        assert_eq!(cfg.sweep_interval, Duration::from_secs(600));
        assert_eq!(cfg.tile_size, 256);
        assert_eq!(cfg.max_zoom, 22);
        assert_eq!(cfg.listen_addr(), "0.0.0.0:3001");
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("PORT", "8080"),
            ("DATA_DIR", "/srv/rasters"),
            ("CACHE_AGE_MINUTES", "15"),
            ("TILE_SIZE", "512"),
        ]);
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/rasters"));
        assert_eq!(cfg.cache_max_age, Duration::from_secs(15 * 60));
        assert_eq!(cfg.tile_size, 512);
    }

    #[test]
    fn test_hours_override_minutes() {
        let cfg = config(&[("CACHE_AGE_MINUTES", "15"), ("MAX_CACHE_AGE_HOURS", "2")]);
        assert_eq!(cfg.cache_max_age, Duration::from_secs(2 * 3600));
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let cfg = config(&[("PORT", "http"), ("TILE_SIZE", "4096"), ("MAX_ZOOM", "-3")]);
        assert_eq!(cfg.port, 3001);
        assert_eq!(cfg.tile_size, 256);
        assert_eq!(cfg.max_zoom, 22);
    }

    #[test]
    fn test_max_zoom_is_clamped() {
        assert_eq!(config(&[("MAX_ZOOM", "64")]).max_zoom, MAX_SUPPORTED_ZOOM);
        assert_eq!(config(&[("MAX_ZOOM", "30")]).max_zoom, 30);
        assert_eq!(config(&[("MAX_ZOOM", "18")]).max_zoom, 18);
    }
}
