//! Point-array projection between EPSG coordinate reference systems.

use crate::mercator;
use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use thiserror::Error;
use tile_common::crs::{EPSG_WEB_MERCATOR, EPSG_WGS84};
use tile_common::{CrsCode, TileError};
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("EPSG:{0} is not in the CRS definitions database")]
    UnsupportedCrs(u32),

    #[error("Invalid projection definition for EPSG:{epsg}: {message}")]
    InvalidDefinition { epsg: u32, message: String },

    #[error("Transform from {from} to {to} failed: {message}")]
    TransformFailed {
        from: CrsCode,
        to: CrsCode,
        message: String,
    },
}

impl From<ProjectionError> for TileError {
    fn from(err: ProjectionError) -> Self {
        TileError::TileGenerationError(format!("Reprojection failed: {}", err))
    }
}

/// Transforms coordinate pairs between two reference systems in place.
///
/// Geographic coordinates are `(lon, lat)` in degrees on both sides.
pub trait PointProjector: Send + Sync {
    fn project(
        &self,
        from: CrsCode,
        to: CrsCode,
        points: &mut [(f64, f64)],
    ) -> Result<(), ProjectionError>;
}

/// Projector backed by proj4rs, with EPSG definitions from `crs-definitions`.
///
/// WGS84 <-> Web Mercator is handled analytically since it is by far the most
/// common pair for drone and satellite orthophotos.
#[derive(Debug, Default, Clone, Copy)]
pub struct Proj4Projector;

impl Proj4Projector {
    pub fn new() -> Self {
        Self
    }

    fn definition(crs: CrsCode) -> Result<Proj, ProjectionError> {
        let epsg = crs.epsg();
        let proj4 = u16::try_from(epsg)
            .ok()
            .and_then(crs_definitions::from_code)
            .map(|def| def.proj4)
            .ok_or(ProjectionError::UnsupportedCrs(epsg))?;
        Proj::from_proj_string(proj4).map_err(|e| ProjectionError::InvalidDefinition {
            epsg,
            message: format!("{:?}", e),
        })
    }
}

impl PointProjector for Proj4Projector {
    fn project(
        &self,
        from: CrsCode,
        to: CrsCode,
        points: &mut [(f64, f64)],
    ) -> Result<(), ProjectionError> {
        if from.epsg() == to.epsg() {
            return Ok(());
        }

        match (from.epsg(), to.epsg()) {
            (EPSG_WGS84, EPSG_WEB_MERCATOR) => {
                for p in points.iter_mut() {
                    *p = mercator::lon_lat_to_mercator(p.0, p.1);
                }
                return Ok(());
            }
            (EPSG_WEB_MERCATOR, EPSG_WGS84) => {
                for p in points.iter_mut() {
                    *p = mercator::mercator_to_lon_lat(p.0, p.1);
                }
                return Ok(());
            }
            _ => {}
        }

        debug!(from = %from, to = %to, count = points.len(), "Projecting with proj4rs");

        let source = Self::definition(from)?;
        let target = Self::definition(to)?;

        for p in points.iter_mut() {
            // proj4rs works in radians for geographic systems
            let mut point = if from.is_geographic() {
                (p.0.to_radians(), p.1.to_radians(), 0.0)
            } else {
                (p.0, p.1, 0.0)
            };

            transform(&source, &target, &mut point).map_err(|e| {
                ProjectionError::TransformFailed {
                    from,
                    to,
                    message: format!("{:?}", e),
                }
            })?;

            let (x, y) = if to.is_geographic() {
                (point.0.to_degrees(), point.1.to_degrees())
            } else {
                (point.0, point.1)
            };

            if !x.is_finite() || !y.is_finite() {
                return Err(ProjectionError::TransformFailed {
                    from,
                    to,
                    message: format!("non-finite result for ({}, {})", p.0, p.1),
                });
            }
            *p = (x, y);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_crs_is_noop() {
        let mut points = [(10.0, 51.5)];
        Proj4Projector::new()
            .project(CrsCode::wgs84(), CrsCode::wgs84(), &mut points)
            .unwrap();
        assert_eq!(points, [(10.0, 51.5)]);
    }

    #[test]
    fn test_mercator_fast_path() {
        let mut points = [(0.0, 0.0), (180.0, 0.0)];
        Proj4Projector::new()
            .project(CrsCode::wgs84(), CrsCode::web_mercator(), &mut points)
            .unwrap();
        assert!(points[0].0.abs() < 1e-6);
        assert!((points[1].0 - mercator::HALF_WORLD).abs() < 1e-3);
    }

    #[test]
    fn test_utm_roundtrip() {
        // UTM zone 33N, central meridian 15E
        let utm = CrsCode::Projected(32633);
        let projector = Proj4Projector::new();

        let mut points = [(15.0, 0.0), (16.0, 45.0)];
        projector.project(CrsCode::wgs84(), utm, &mut points).unwrap();
        assert!((points[0].0 - 500_000.0).abs() < 1.0);
        assert!(points[0].1.abs() < 1.0);

        projector.project(utm, CrsCode::wgs84(), &mut points).unwrap();
        assert!((points[1].0 - 16.0).abs() < 1e-6);
        assert!((points[1].1 - 45.0).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_code() {
        let mut points = [(0.0, 0.0)];
        let err = Proj4Projector::new()
            .project(CrsCode::wgs84(), CrsCode::Projected(999_999), &mut points)
            .unwrap_err();
        assert!(matches!(err, ProjectionError::UnsupportedCrs(999_999)));
    }
}
