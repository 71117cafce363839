//! Band metadata resolution.
//!
//! Band names come from the GDAL_METADATA TIFF tag when present, otherwise
//! from a conventional layout keyed by band count. Every band is then
//! reachable by its canonical name, by position (`b3`, `band3`) and by at most
//! one semantic alias (`red`, `nir`, `swir1`, ...).

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

/// Semantic band categories, in matching precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticCategory {
    RedEdge,
    Red,
    Green,
    Blue,
    Nir,
    Swir,
}

struct SemanticRule {
    category: SemanticCategory,
    any_of: &'static [&'static str],
    none_of: &'static [&'static str],
    aliases: &'static [&'static str],
}

/// Substring rules tried top to bottom against the lower-cased band name.
/// The first matching rule wins. Red edge must precede red, and red must
/// not claim "infrared".
const SEMANTIC_RULES: &[SemanticRule] = &[
    SemanticRule {
        category: SemanticCategory::RedEdge,
        any_of: &["rededge", "red edge", "red_edge", "red-edge"],
        none_of: &[],
        aliases: &["rededge", "re"],
    },
    SemanticRule {
        category: SemanticCategory::Red,
        any_of: &["red"],
        none_of: &["edge", "infrared"],
        aliases: &["red", "r"],
    },
    SemanticRule {
        category: SemanticCategory::Green,
        any_of: &["green"],
        none_of: &[],
        aliases: &["green", "g"],
    },
    SemanticRule {
        category: SemanticCategory::Blue,
        any_of: &["blue"],
        none_of: &[],
        aliases: &["blue", "b"],
    },
    SemanticRule {
        category: SemanticCategory::Nir,
        any_of: &["nir", "infrared"],
        none_of: &[],
        aliases: &["nir", "near_infrared"],
    },
    SemanticRule {
        category: SemanticCategory::Swir,
        any_of: &["swir"],
        none_of: &[],
        aliases: &["swir"],
    },
];

/// Match a band name against the semantic precedence table.
pub fn semantic_category(name: &str) -> Option<SemanticCategory> {
    let lower = name.to_lowercase();
    SEMANTIC_RULES
        .iter()
        .find(|rule| {
            rule.any_of.iter().any(|s| lower.contains(s))
                && !rule.none_of.iter().any(|s| lower.contains(s))
        })
        .map(|rule| rule.category)
}

/// All aliases for one band, lower-cased: positional aliases first, then
/// the semantic aliases of the first matching category.
pub fn band_aliases(name: &str, index: usize) -> Vec<String> {
    let mut aliases = vec![format!("b{}", index + 1), format!("band{}", index + 1)];

    let Some(category) = semantic_category(name) else {
        return aliases;
    };
    let lower = name.to_lowercase();
    if let Some(rule) = SEMANTIC_RULES.iter().find(|r| r.category == category) {
        aliases.extend(rule.aliases.iter().map(|a| a.to_string()));
    }
    if category == SemanticCategory::Swir {
        if lower.contains('1') {
            aliases.push("swir1".to_string());
        }
        if lower.contains('2') {
            aliases.push("swir2".to_string());
        }
    }
    aliases
}

/// Conventional band layouts by band count.
pub fn default_band_names(band_count: usize) -> Option<&'static [&'static str]> {
    match band_count {
        3 => Some(&["Red", "Green", "Blue"]),
        4 => Some(&["Red", "Green", "Blue", "NIR"]),
        5 => Some(&["Blue", "Green", "Red", "NIR", "SWIR1"]),
        6 => Some(&["Blue", "Green", "Red", "NIR", "SWIR1", "SWIR2"]),
        8 => Some(&[
            "Coastal", "Blue", "Green", "Red", "RedEdge", "NIR", "SWIR1", "SWIR2",
        ]),
        _ => None,
    }
}

/// One raster band.
#[derive(Debug, Clone, Serialize)]
pub struct BandInfo {
    pub index: usize,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<SemanticCategory>,
}

/// Canonical band names plus the case-insensitive alias table.
///
/// Built once per opened dataset and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct BandMetadata {
    bands: Vec<BandInfo>,
    aliases: HashMap<String, usize>,
}

impl BandMetadata {
    /// Resolve names for `band_count` bands from an optional GDAL_METADATA block.
    pub fn resolve(band_count: usize, gdal_metadata: Option<&str>) -> Self {
        let mut names = gdal_metadata
            .map(|xml| parse_gdal_band_names(xml, band_count))
            .unwrap_or_default();

        if names.iter().all(Option::is_none) {
            names = match default_band_names(band_count) {
                Some(layout) => layout.iter().map(|n| Some(n.to_string())).collect(),
                None => Vec::new(),
            };
        }
        names.resize(band_count, None);

        let names: Vec<String> = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| name.unwrap_or_else(|| format!("Band{}", i + 1)))
            .collect();
        Self::from_names(&names)
    }

    /// Build the alias table from already known band names.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let bands: Vec<BandInfo> = names
            .iter()
            .enumerate()
            .map(|(index, name)| BandInfo {
                index,
                name: name.as_ref().to_string(),
                category: semantic_category(name.as_ref()),
            })
            .collect();

        let mut aliases = HashMap::new();
        // Positional aliases are unambiguous and always win.
        for band in &bands {
            aliases.insert(format!("b{}", band.index + 1), band.index);
            aliases.insert(format!("band{}", band.index + 1), band.index);
        }
        for band in &bands {
            aliases
                .entry(band.name.to_lowercase())
                .or_insert(band.index);
            for alias in band_aliases(&band.name, band.index) {
                aliases.entry(alias).or_insert(band.index);
            }
        }

        Self { bands, aliases }
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn bands(&self) -> &[BandInfo] {
        &self.bands
    }

    /// Canonical names in band order.
    pub fn band_names(&self) -> Vec<String> {
        self.bands.iter().map(|b| b.name.clone()).collect()
    }

    /// Band index for an alias or canonical name, case-insensitive.
    pub fn index_of(&self, alias: &str) -> Option<usize> {
        self.aliases.get(&alias.trim().to_lowercase()).copied()
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.index_of(alias).is_some()
    }
}

#[derive(Debug, Default)]
struct GdalItem {
    name: String,
    sample: Option<usize>,
    value: String,
}

/// Recover per-band names from a GDAL_METADATA XML block.
///
/// Tried in order, the first shape that yields any name wins:
/// `DESCRIPTION` items with a 0-based `sample`, `Band_N` items (1-based),
/// then sequential `BAND_NAME` items.
pub fn parse_gdal_band_names(xml: &str, band_count: usize) -> Vec<Option<String>> {
    let items = match read_gdal_items(xml) {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, "Failed to parse GDAL_METADATA, ignoring band names");
            return vec![None; band_count];
        }
    };

    let mut names: Vec<Option<String>> = vec![None; band_count];

    for item in items.iter().filter(|i| i.name.eq_ignore_ascii_case("DESCRIPTION")) {
        if let Some(sample) = item.sample.filter(|s| *s < band_count) {
            names[sample] = Some(item.value.clone());
        }
    }
    if names.iter().any(Option::is_some) {
        return names;
    }

    for item in &items {
        let number = item
            .name
            .strip_prefix("Band_")
            .and_then(|n| n.parse::<usize>().ok());
        if let Some(n) = number.filter(|n| *n >= 1 && *n <= band_count) {
            names[n - 1] = Some(item.value.clone());
        }
    }
    if names.iter().any(Option::is_some) {
        return names;
    }

    items
        .iter()
        .filter(|i| i.name == "BAND_NAME")
        .take(band_count)
        .enumerate()
        .for_each(|(i, item)| names[i] = Some(item.value.clone()));
    names
}

fn read_gdal_items(xml: &str) -> Result<Vec<GdalItem>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut items = Vec::new();
    let mut current: Option<GdalItem> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"Item" => {
                let mut item = GdalItem::default();
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"name" => item.name = attr.unescape_value()?.into_owned(),
                        b"sample" => item.sample = attr.unescape_value()?.trim().parse().ok(),
                        _ => {}
                    }
                }
                current = Some(item);
            }
            Event::Text(t) => {
                if let Some(item) = current.as_mut() {
                    item.value.push_str(&t.unescape()?);
                }
            }
            Event::End(e) if e.name().as_ref() == b"Item" => {
                if let Some(mut item) = current.take() {
                    item.value = item.value.trim().to_string();
                    if !item.value.is_empty() {
                        items.push(item);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(items)
}
