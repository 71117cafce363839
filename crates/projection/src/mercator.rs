//! Spherical Web Mercator (EPSG:3857) forward and inverse transforms.

use std::f64::consts::PI;
use tile_common::tile::MAX_MERCATOR_LAT;

/// WGS84 semi-major axis used by the spherical Web Mercator model.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Half the width of the square Web Mercator world in meters.
pub const HALF_WORLD: f64 = PI * EARTH_RADIUS;

/// Convert lon/lat degrees to Web Mercator meters.
///
/// Latitude is clamped to the Mercator limit so the result is always finite.
pub fn lon_lat_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let x = lon.to_radians() * EARTH_RADIUS;
    let y = (PI / 4.0 + lat.to_radians() / 2.0).tan().ln() * EARTH_RADIUS;
    (x, y)
}

/// Convert Web Mercator meters to lon/lat degrees.
pub fn mercator_to_lon_lat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    (lon, lat)
}
