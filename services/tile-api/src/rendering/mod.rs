//! Tile rendering pipeline.
//!
//! - `window`: tile address to raster pixel window, with zoom recovery
//! - `sampling`: nearest-neighbour resampling onto the output grid
//! - `pipeline`: formula, true-color and VARI tile orchestration

pub mod pipeline;
pub mod sampling;
pub mod window;

pub use pipeline::{
    select_stretch, transparent_tile, IndexTileRequest, PreparedFormula, RenderOptions,
    RenderedTile, TileRenderer,
};
pub use window::{recover_zoom, resolve_tile_window, RasterGrid, TileWindow};
