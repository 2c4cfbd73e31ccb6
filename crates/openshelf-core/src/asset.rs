//! Normalized catalog records and filter matching.
//!
//! A `CulturalAsset` is the common shape every repository parses its raw
//! records into. Records are constructed once during parsing and treated as
//! immutable afterwards; result lists hold clones owned by the UI.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default short-description length before truncation.
pub const SHORT_DESCRIPTION_LEN: usize = 100;

/// Normalized record for one cultural-heritage artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CulturalAsset {
    // Identity
    pub id: String,
    /// Source tag of the repository that produced this record.
    pub repository: String,
    pub inventory_number: String,

    // Descriptive
    pub name: String,
    pub description: String,
    pub object_type: String,
    pub materials: Vec<String>,
    pub chronology: Vec<String>,
    pub provenance: String,
    pub tags: Vec<String>,

    // Technical
    pub model_urls: Vec<String>,
    pub thumbnail_url: Option<String>,
    pub file_format: String,
    /// Estimated archive size in KB.
    pub file_size_kb: u64,
    pub has_textures: bool,
    /// 0-100, clamped at construction.
    pub quality_score: u8,
    pub license_info: String,
    pub detail_url: String,
    pub catalog_url: String,
    /// Repository-specific fields that survived normalization.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl CulturalAsset {
    /// Create a record with the two mandatory identity fields.
    pub fn new(id: impl Into<String>, repository: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        let repository = repository.into();
        if id.trim().is_empty() || repository.trim().is_empty() {
            return Err(crate::OpenShelfError::Precondition {
                message: "asset id and repository must be non-empty".to_string(),
            });
        }
        Ok(Self {
            id,
            repository,
            file_format: "obj".to_string(),
            ..Self::default()
        })
    }

    /// Display name: `"[inventory] name"` when an inventory number exists.
    pub fn display_name(&self) -> String {
        if self.inventory_number.is_empty() {
            self.name.clone()
        } else {
            format!("[{}] {}", self.inventory_number, self.name)
        }
    }

    /// Description truncated to `max_len` characters with an ellipsis.
    pub fn short_description(&self, max_len: usize) -> String {
        let trimmed = self.description.trim();
        if trimmed.chars().count() <= max_len {
            trimmed.to_string()
        } else {
            let cut: String = trimmed.chars().take(max_len).collect();
            format!("{}...", cut.trim_end())
        }
    }

    /// Lowercased concatenation of every searchable field.
    pub fn search_text(&self) -> String {
        let mut parts: Vec<&str> = vec![
            &self.name,
            &self.description,
            &self.object_type,
            &self.inventory_number,
            &self.provenance,
        ];
        parts.extend(self.materials.iter().map(String::as_str));
        parts.extend(self.chronology.iter().map(String::as_str));
        parts.extend(self.tags.iter().map(String::as_str));
        parts
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// Whether at least one downloadable model URL exists.
    pub fn has_3d_model(&self) -> bool {
        self.model_urls.iter().any(|u| !u.trim().is_empty())
    }

    /// Serialize the full record to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Clamp and set the quality score.
    pub fn set_quality_score(&mut self, score: i64) {
        self.quality_score = score.clamp(0, 100) as u8;
    }

    /// Conjunction of all provided filters, short-circuiting on the first
    /// failure. An empty filter set matches everything.
    pub fn matches_filter(&self, filters: &AssetFilters) -> bool {
        if let Some(query) = filters.value(FilterKey::Search) {
            if !self.search_text().contains(&query) {
                return false;
            }
        }
        if let Some(wanted) = filters.value(FilterKey::ObjectType) {
            if !self.object_type.to_lowercase().contains(&wanted) {
                return false;
            }
        }
        if let Some(wanted) = filters.value(FilterKey::Material) {
            if !contains_any(&self.materials, &wanted) {
                return false;
            }
        }
        if let Some(wanted) = filters.value(FilterKey::Chronology) {
            if !contains_any(&self.chronology, &wanted) {
                return false;
            }
        }
        if let Some(wanted) = filters.value(FilterKey::Inventory) {
            if !self.inventory_number.to_lowercase().contains(&wanted) {
                return false;
            }
        }
        if let Some(wanted) = filters.value(FilterKey::Provenance) {
            if !self.provenance.to_lowercase().contains(&wanted) {
                return false;
            }
        }
        true
    }
}

fn contains_any(haystack: &[String], needle: &str) -> bool {
    haystack.iter().any(|s| s.to_lowercase().contains(needle))
}

/// Recognized filter keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKey {
    Search,
    ObjectType,
    Material,
    Chronology,
    Inventory,
    Provenance,
}

impl FilterKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKey::Search => "search",
            FilterKey::ObjectType => "object_type",
            FilterKey::Material => "material",
            FilterKey::Chronology => "chronology",
            FilterKey::Inventory => "inventory",
            FilterKey::Provenance => "provenance",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "search" => Some(FilterKey::Search),
            "object_type" => Some(FilterKey::ObjectType),
            "material" => Some(FilterKey::Material),
            "chronology" => Some(FilterKey::Chronology),
            "inventory" => Some(FilterKey::Inventory),
            "provenance" => Some(FilterKey::Provenance),
            _ => None,
        }
    }
}

/// User-entered filter values for one search.
///
/// Empty and whitespace-only values are treated as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetFilters {
    pub search: Option<String>,
    pub object_type: Option<String>,
    pub material: Option<String>,
    pub chronology: Option<String>,
    pub inventory: Option<String>,
    pub provenance: Option<String>,
}

impl AssetFilters {
    /// Build filters from a loose string map; unrecognized keys are ignored.
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let mut filters = Self::default();
        for (key, value) in map {
            if let Some(key) = FilterKey::from_str(key) {
                filters.set(key, value.clone());
            }
        }
        filters
    }

    pub fn set(&mut self, key: FilterKey, value: String) {
        let slot = match key {
            FilterKey::Search => &mut self.search,
            FilterKey::ObjectType => &mut self.object_type,
            FilterKey::Material => &mut self.material,
            FilterKey::Chronology => &mut self.chronology,
            FilterKey::Inventory => &mut self.inventory,
            FilterKey::Provenance => &mut self.provenance,
        };
        *slot = Some(value);
    }

    /// Normalized (trimmed, lowercased) value for a key, or `None` when the
    /// value is absent or blank.
    fn value(&self, key: FilterKey) -> Option<String> {
        let raw = match key {
            FilterKey::Search => &self.search,
            FilterKey::ObjectType => &self.object_type,
            FilterKey::Material => &self.material,
            FilterKey::Chronology => &self.chronology,
            FilterKey::Inventory => &self.inventory,
            FilterKey::Provenance => &self.provenance,
        };
        raw.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    /// Whether no filter carries a usable value.
    pub fn is_empty(&self) -> bool {
        [
            FilterKey::Search,
            FilterKey::ObjectType,
            FilterKey::Material,
            FilterKey::Chronology,
            FilterKey::Inventory,
            FilterKey::Provenance,
        ]
        .iter()
        .all(|k| self.value(*k).is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_asset() -> CulturalAsset {
        let mut asset = CulturalAsset::new("77445", "ercolano").unwrap();
        asset.inventory_number = "IV-001".to_string();
        asset.name = "anello".to_string();
        asset.object_type = "anello".to_string();
        asset.description = "Anello in oro con gemma incisa".to_string();
        asset.materials = vec!["oro".to_string(), "gemma".to_string()];
        asset.chronology = vec!["I sec. d.C.".to_string()];
        asset.provenance = "Ercolano, Casa dei Cervi".to_string();
        asset.model_urls = vec!["http://example.test/77445.zip".to_string()];
        asset
    }

    #[test]
    fn test_new_rejects_empty_identity() {
        assert!(CulturalAsset::new("", "ercolano").is_err());
        assert!(CulturalAsset::new("77445", "  ").is_err());
    }

    #[test]
    fn test_display_name_with_inventory() {
        assert_eq!(sample_asset().display_name(), "[IV-001] anello");

        let mut no_inv = sample_asset();
        no_inv.inventory_number.clear();
        assert_eq!(no_inv.display_name(), "anello");
    }

    #[test]
    fn test_short_description_truncates() {
        let mut asset = sample_asset();
        asset.description = "x".repeat(200);
        let short = asset.short_description(SHORT_DESCRIPTION_LEN);
        assert_eq!(short.chars().count(), SHORT_DESCRIPTION_LEN + 3);
        assert!(short.ends_with("..."));

        asset.description = "breve".to_string();
        assert_eq!(asset.short_description(SHORT_DESCRIPTION_LEN), "breve");
    }

    #[test]
    fn test_search_text_covers_all_fields() {
        let text = sample_asset().search_text();
        assert!(text.contains("anello"));
        assert!(text.contains("oro"));
        assert!(text.contains("i sec. d.c."));
        assert!(text.contains("iv-001"));
        assert!(text.contains("casa dei cervi"));
    }

    #[test]
    fn test_has_3d_model() {
        assert!(sample_asset().has_3d_model());

        let mut blank = sample_asset();
        blank.model_urls = vec!["   ".to_string()];
        assert!(!blank.has_3d_model());
    }

    #[test]
    fn test_empty_filters_match_everything() {
        assert!(sample_asset().matches_filter(&AssetFilters::default()));
    }

    #[test]
    fn test_filter_conjunction() {
        let asset = sample_asset();

        let mut filters = AssetFilters::default();
        filters.set(FilterKey::Material, "ORO".to_string());
        filters.set(FilterKey::ObjectType, "anello".to_string());
        assert!(asset.matches_filter(&filters));

        // Adding a failing filter breaks the conjunction.
        filters.set(FilterKey::Provenance, "pompei".to_string());
        assert!(!asset.matches_filter(&filters));
    }

    #[test]
    fn test_whitespace_filter_values_ignored() {
        let mut filters = AssetFilters::default();
        filters.set(FilterKey::Search, "   ".to_string());
        assert!(filters.is_empty());
        assert!(sample_asset().matches_filter(&filters));
    }

    #[test]
    fn test_from_map_ignores_unknown_keys() {
        let mut map = HashMap::new();
        map.insert("object_type".to_string(), "anello".to_string());
        map.insert("bogus".to_string(), "ignored".to_string());
        let filters = AssetFilters::from_map(&map);
        assert_eq!(filters.object_type.as_deref(), Some("anello"));
        assert!(filters.search.is_none());
    }

    #[test]
    fn test_to_json_preserves_fields() {
        let asset = sample_asset();
        let value = asset.to_json();
        assert_eq!(value["id"], "77445");
        assert_eq!(value["repository"], "ercolano");
        assert_eq!(value["inventory_number"], "IV-001");
        assert_eq!(value["materials"][0], "oro");

        let back: CulturalAsset = serde_json::from_value(value).unwrap();
        assert_eq!(back, asset);
    }

    #[test]
    fn test_quality_score_clamped() {
        let mut asset = sample_asset();
        asset.set_quality_score(250);
        assert_eq!(asset.quality_score, 100);
        asset.set_quality_score(-5);
        assert_eq!(asset.quality_score, 0);
    }
}
