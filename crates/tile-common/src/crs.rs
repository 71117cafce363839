//! Coordinate Reference System identifiers.

use serde::{Serialize, Serializer};
use std::fmt;

/// EPSG code of WGS84 geographic coordinates.
pub const EPSG_WGS84: u32 = 4326;
/// EPSG code of spherical Web Mercator.
pub const EPSG_WEB_MERCATOR: u32 = 3857;

/// Native coordinate reference of a raster, as recorded in its GeoKeys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrsCode {
    /// Geographic (lon/lat degrees) CRS with the given EPSG code.
    Geographic(u32),
    /// Projected (easting/northing) CRS with the given EPSG code.
    Projected(u32),
}

impl CrsCode {
    pub fn wgs84() -> Self {
        CrsCode::Geographic(EPSG_WGS84)
    }

    pub fn web_mercator() -> Self {
        CrsCode::Projected(EPSG_WEB_MERCATOR)
    }

    /// Classify a bare EPSG code. Codes in the 4000-4999 block are geographic
    /// datums; everything else is treated as projected.
    pub fn from_epsg(code: u32) -> Self {
        if (4000..5000).contains(&code) {
            CrsCode::Geographic(code)
        } else {
            CrsCode::Projected(code)
        }
    }

    /// Parse strings like "EPSG:32633" or "epsg:4326".
    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.trim().to_uppercase();
        let code = upper.strip_prefix("EPSG:")?;
        code.parse().ok().map(Self::from_epsg)
    }

    pub fn epsg(&self) -> u32 {
        match self {
            CrsCode::Geographic(code) | CrsCode::Projected(code) => *code,
        }
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Geographic(_))
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

impl Serialize for CrsCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let crs = CrsCode::parse("epsg:32633").unwrap();
        assert_eq!(crs, CrsCode::Projected(32633));
        assert_eq!(crs.to_string(), "EPSG:32633");
        assert!(CrsCode::parse("CRS:84").is_none());
    }

    #[test]
    fn test_geographic_classification() {
        assert!(CrsCode::from_epsg(4326).is_geographic());
        assert!(CrsCode::from_epsg(4269).is_geographic());
        assert!(!CrsCode::from_epsg(3857).is_geographic());
        assert!(!CrsCode::web_mercator().is_geographic());
    }
}
