//! Tile rendering: colormaps, scalar and true-color rasterization, and
//! image encoding.

pub mod colormap;
pub mod encode;
pub mod gradient;
pub mod png;

pub use colormap::{ColorMap, Lut, LutCache, Stretch};
pub use encode::{encode, EncodeError, ImageFormat};
pub use gradient::Color;
