//! Band semantics and per-pixel band algebra.
//!
//! - [`bands`] maps raw raster bands to canonical names and aliases
//! - [`expression`] compiles formulas like `(nir - red) / (nir + red)` to RPN
//! - [`indices`] is the registry of well-known spectral indices
//! - [`compute`] evaluates a compiled formula over a window of band samples

pub mod bands;
pub mod compute;
pub mod expression;
pub mod indices;

pub use bands::{BandInfo, BandMetadata, SemanticCategory};
pub use compute::{evaluate_bands, BandSet, IndexResult};
pub use expression::{CompiledExpression, ExpressionError};
pub use indices::{can_calculate, get_index, list_indices, IndexAvailability, SpectralIndexDefinition};
