//! Common types and utilities shared by the raster tile crates.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod grid;
pub mod tile;

pub use bbox::BoundingBox;
pub use crs::CrsCode;
pub use error::{TileError, TileResult};
pub use grid::{GeoTransform, PixelWindow};
pub use tile::{TileCoord, TileRange};
