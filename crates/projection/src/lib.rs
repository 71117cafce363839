//! Coordinate reference system transformations.
//!
//! The tile pipeline only ever needs to move a handful of points (tile corners,
//! raster corners) between WGS84 and a raster's native CRS, so the public
//! surface is a single point-array projector.

pub mod mercator;
pub mod projector;

pub use projector::{PointProjector, Proj4Projector, ProjectionError};
