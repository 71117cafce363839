//! Registry of well-known spectral indices.
//!
//! Equations are written over semantic aliases (`nir`, `red`, ...) so they
//! compile against any dataset whose bands resolve those aliases.

use crate::bands::BandMetadata;
use serde::Serialize;
use tile_common::{TileError, TileResult};

/// Colormap used when an index has no explicit recommendation.
pub const DEFAULT_COLORMAP: &str = "viridis";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectralIndexDefinition {
    /// Short code used to request the index, e.g. `NDVI`
    pub code: &'static str,
    pub name: &'static str,
    pub equation: &'static str,
    pub description: &'static str,
    /// Theoretical value range
    pub range: (f64, f64),
    /// Sub-range that gives better contrast on typical scenes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_range: Option<(f64, f64)>,
    pub required_bands: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<&'static str>,
    pub recommended_colormap: &'static str,
}

impl SpectralIndexDefinition {
    /// Range used for fixed stretching when the caller gives none.
    pub fn display_range(&self) -> (f64, f64) {
        self.visual_range.unwrap_or(self.range)
    }
}

pub static SPECTRAL_INDICES: &[SpectralIndexDefinition] = &[
    SpectralIndexDefinition {
        code: "NDVI",
        name: "Normalized Difference Vegetation Index",
        equation: "(nir - red) / (nir + red)",
        description: "Most common vegetation index, from -1 to 1",
        range: (-1.0, 1.0),
        visual_range: Some((0.2, 0.9)),
        required_bands: &["nir", "red"],
        reference: Some("Tucker (1979)"),
        recommended_colormap: "RdYlGn",
    },
    SpectralIndexDefinition {
        code: "NDWI",
        name: "Normalized Difference Water Index",
        equation: "(green - nir) / (green + nir)",
        description: "Highlights open water bodies",
        range: (-1.0, 1.0),
        visual_range: None,
        required_bands: &["green", "nir"],
        reference: Some("McFeeters (1996)"),
        recommended_colormap: "RdYlBu",
    },
    SpectralIndexDefinition {
        code: "EVI",
        name: "Enhanced Vegetation Index",
        equation: "2.5 * ((nir - red) / (nir + 6 * red - 7.5 * blue + 1))",
        description: "NDVI variant with reduced atmospheric and canopy background influence",
        range: (-1.0, 1.0),
        visual_range: None,
        required_bands: &["nir", "red", "blue"],
        reference: Some("Huete et al. (2002)"),
        recommended_colormap: "RdYlGn",
    },
    SpectralIndexDefinition {
        code: "SAVI",
        name: "Soil Adjusted Vegetation Index",
        equation: "((nir - red) / (nir + red + 0.5)) * 1.5",
        description: "Reduces soil brightness influence in sparse vegetation",
        range: (-1.0, 1.0),
        visual_range: None,
        required_bands: &["nir", "red"],
        reference: Some("Huete (1988)"),
        recommended_colormap: "RdYlGn",
    },
    SpectralIndexDefinition {
        code: "VARI",
        name: "Visible Atmospherically Resistant Index",
        equation: "(green - red) / (green + red - blue)",
        description: "Vegetation index using visible bands only",
        range: (-1.0, 1.0),
        visual_range: None,
        required_bands: &["green", "red", "blue"],
        reference: None,
        recommended_colormap: "viridis",
    },
    SpectralIndexDefinition {
        code: "NDMI",
        name: "Normalized Difference Moisture Index",
        equation: "(nir - swir1) / (nir + swir1)",
        description: "Sensitive to vegetation water content",
        range: (-1.0, 1.0),
        visual_range: None,
        required_bands: &["nir", "swir1"],
        reference: Some("Gao (1996)"),
        recommended_colormap: "RdYlBu",
    },
    SpectralIndexDefinition {
        code: "NBR",
        name: "Normalized Burn Ratio",
        equation: "(nir - swir2) / (nir + swir2)",
        description: "Maps burned areas and burn severity",
        range: (-1.0, 1.0),
        visual_range: None,
        required_bands: &["nir", "swir2"],
        reference: Some("Key & Benson (2006)"),
        recommended_colormap: "Spectral",
    },
    SpectralIndexDefinition {
        code: "GNDVI",
        name: "Green Normalized Difference Vegetation Index",
        equation: "(nir - green) / (nir + green)",
        description: "NDVI with the green band, more sensitive to chlorophyll",
        range: (-1.0, 1.0),
        visual_range: None,
        required_bands: &["nir", "green"],
        reference: None,
        recommended_colormap: "RdYlGn",
    },
    SpectralIndexDefinition {
        code: "NDRE",
        name: "Normalized Difference Red Edge",
        equation: "(nir - rededge) / (nir + rededge)",
        description: "Crop health monitoring in dense canopies",
        range: (-1.0, 1.0),
        visual_range: None,
        required_bands: &["nir", "rededge"],
        reference: None,
        recommended_colormap: "RdYlGn",
    },
    SpectralIndexDefinition {
        code: "MSAVI",
        name: "Modified Soil Adjusted Vegetation Index",
        equation: "(2 * nir + 1 - sqrt((2 * nir + 1)^2 - 8 * (nir - red))) / 2",
        description: "SAVI without a fixed soil adjustment factor",
        range: (-1.0, 1.0),
        visual_range: None,
        required_bands: &["nir", "red"],
        reference: Some("Qi et al. (1994)"),
        recommended_colormap: "RdYlGn",
    },
];

/// Look up an index by code, case-insensitive.
pub fn get_index(code: &str) -> Option<&'static SpectralIndexDefinition> {
    let code = code.trim();
    SPECTRAL_INDICES
        .iter()
        .find(|def| def.code.eq_ignore_ascii_case(code))
}

pub fn list_indices() -> &'static [SpectralIndexDefinition] {
    SPECTRAL_INDICES
}

pub fn index_codes() -> Vec<&'static str> {
    SPECTRAL_INDICES.iter().map(|def| def.code).collect()
}

/// Recommended colormap for an index code, `viridis` for anything unknown.
pub fn recommended_colormap(code: &str) -> &'static str {
    get_index(code)
        .map(|def| def.recommended_colormap)
        .unwrap_or(DEFAULT_COLORMAP)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexAvailability {
    pub can_calculate: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_bands: Vec<&'static str>,
}

/// Check whether every alias an index needs resolves against a dataset.
pub fn can_calculate(code: &str, metadata: &BandMetadata) -> TileResult<IndexAvailability> {
    let def = get_index(code).ok_or_else(|| TileError::UnknownIndex(code.to_string()))?;
    let missing_bands: Vec<&'static str> = def
        .required_bands
        .iter()
        .copied()
        .filter(|alias| !metadata.has_alias(alias))
        .collect();

    Ok(IndexAvailability {
        can_calculate: missing_bands.is_empty(),
        missing_bands,
    })
}
