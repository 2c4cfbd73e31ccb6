//! Repository implementation for the Ercolano archaeological catalog.
//!
//! The catalog is a single JSON document fetched over HTTPS; records live
//! under `jsonData.records`. Field names follow the upstream Italian schema.

use crate::asset::CulturalAsset;
use crate::config::NetworkConfig;
use crate::error::{OpenShelfError, Result};
use crate::repository::{FetchCache, Repository, SourceConfig};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Default catalog endpoint.
const ERCOLANO_JSON_URL: &str =
    "https://opendata-ercolano.cultura.gov.it/api/3d-models/catalog.json";

/// Raw record keys consumed during normalization; everything else survives
/// in the asset's opaque metadata map.
const CONSUMED_KEYS: &[&str] = &[
    "id",
    "nrInventario",
    "oggetto",
    "descrizione",
    "materiaTecnicas",
    "cronologias",
    "modelli3D_hr",
    "linkDettaglio",
    "linkICCD",
    "provenienza",
];

/// The Ercolano open-data catalog.
pub struct ErcolanoRepository {
    config: SourceConfig,
    json_url: String,
    client: reqwest::Client,
    fetch_cache: FetchCache,
}

impl ErcolanoRepository {
    pub fn new() -> Self {
        Self::with_catalog_url(ERCOLANO_JSON_URL)
    }

    /// Point the repository at a different catalog endpoint (tests, mirrors).
    pub fn with_catalog_url(json_url: impl Into<String>) -> Self {
        let json_url = json_url.into();
        let client = reqwest::Client::builder()
            .user_agent(NetworkConfig::USER_AGENT)
            .timeout(NetworkConfig::CATALOG_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            config: SourceConfig {
                name: "ercolano".to_string(),
                description: "Parco Archeologico di Ercolano 3D catalog".to_string(),
                base_url: "https://opendata-ercolano.cultura.gov.it".to_string(),
                api_url: json_url.clone(),
                supported_formats: vec!["obj".to_string()],
                language: "it".to_string(),
                default_license: "CC BY 4.0".to_string(),
            },
            json_url,
            client,
            fetch_cache: FetchCache::new(),
        }
    }

    /// Normalize one raw catalog record, or `None` when the record is
    /// missing its required identity fields.
    fn parse_record(&self, record: &Value) -> Option<CulturalAsset> {
        let id = non_empty_str(record, "id")?;
        let inventory = non_empty_str(record, "nrInventario")?;

        let mut asset = CulturalAsset::new(id, self.name()).ok()?;
        asset.inventory_number = inventory;
        asset.object_type = str_field(record, "oggetto");
        asset.description = str_field(record, "descrizione");
        asset.materials = string_list(record.get("materiaTecnicas"));
        asset.chronology = string_list(record.get("cronologias"));
        asset.model_urls = string_list(record.get("modelli3D_hr"));
        asset.detail_url = str_field(record, "linkDettaglio");
        asset.catalog_url = str_field(record, "linkICCD");
        asset.provenance = str_field(record, "provenienza");
        asset.license_info = self.config.default_license.clone();

        // Catalog records carry the object type, not a curated title.
        asset.name = if !asset.object_type.is_empty() {
            asset.object_type.clone()
        } else {
            asset.inventory_number.clone()
        };

        asset.set_quality_score(quality_score(&asset));
        asset.file_size_kb = estimate_file_size_kb(&asset.object_type);

        if let Some(object) = record.as_object() {
            asset.metadata = object
                .iter()
                .filter(|(key, _)| !CONSUMED_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect::<HashMap<_, _>>();
        }

        Some(asset)
    }
}

impl Default for ErcolanoRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for ErcolanoRepository {
    fn config(&self) -> &SourceConfig {
        &self.config
    }

    async fn fetch_assets(&self, limit: usize) -> Vec<CulturalAsset> {
        if let Some(cached) = self.fetch_cache.get(self.name(), limit) {
            debug!("Fetch cache hit for {} (limit {})", self.name(), limit);
            return cached.as_ref().clone();
        }

        let raw = match self.fetch_catalog().await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Ercolano catalog fetch failed: {}", e);
                return Vec::new();
            }
        };

        let assets = match self.parse_raw_data(&raw) {
            Ok(assets) => assets,
            Err(e) => {
                warn!("Ercolano catalog parse failed: {}", e);
                return Vec::new();
            }
        };

        let assets: Vec<CulturalAsset> = assets.into_iter().take(limit).collect();
        self.fetch_cache.insert(self.name(), limit, assets.clone());
        assets
    }

    fn parse_raw_data(&self, raw: &Value) -> Result<Vec<CulturalAsset>> {
        let records = raw
            .pointer("/jsonData/records")
            .and_then(Value::as_array)
            .ok_or_else(|| OpenShelfError::Parse {
                message: "catalog response is missing jsonData.records".to_string(),
            })?;

        let assets: Vec<CulturalAsset> = records
            .iter()
            .filter_map(|record| self.parse_record(record))
            .collect();

        debug!(
            "Parsed {} of {} Ercolano records",
            assets.len(),
            records.len()
        );
        Ok(assets)
    }

    fn clear_cache(&self) {
        self.fetch_cache.clear();
    }
}

impl ErcolanoRepository {
    async fn fetch_catalog(&self) -> Result<Value> {
        let response = self.client.get(&self.json_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OpenShelfError::Network {
                message: format!("catalog request returned {status}"),
                source: None,
            });
        }
        Ok(response.json::<Value>().await?)
    }
}

/// Coerce a catalog field that may be a scalar or a list of strings.
///
/// A bare string becomes a singleton; a list keeps its string entries;
/// any other shape is treated as absent.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn str_field(record: &Value, key: &str) -> String {
    record
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string()
}

fn non_empty_str(record: &Value, key: &str) -> Option<String> {
    let value = str_field(record, key);
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Completeness heuristic, 0-100.
fn quality_score(asset: &CulturalAsset) -> i64 {
    let mut score: i64 = 20;
    if !asset.description.is_empty() {
        score += 20;
    }
    if !asset.materials.is_empty() {
        score += 15;
    }
    if !asset.chronology.is_empty() {
        score += 15;
    }
    if asset.has_3d_model() {
        score += 20;
    }
    if !asset.detail_url.is_empty() {
        score += 5;
    }
    if !asset.catalog_url.is_empty() {
        score += 5;
    }
    score
}

/// Rough archive size in KB keyed on the object type.
fn estimate_file_size_kb(object_type: &str) -> u64 {
    const SMALL: &[&str] = &["anello", "ring", "moneta", "coin", "gemma", "gem"];
    const MEDIUM: &[&str] = &["vaso", "vase", "coppa", "cup"];
    const LARGE: &[&str] = &[
        "statua", "statue", "rilievo", "relief", "affresco", "fresco",
    ];

    let lowered = object_type.to_lowercase();
    if SMALL.iter().any(|k| lowered.contains(k)) {
        200
    } else if MEDIUM.iter().any(|k| lowered.contains(k)) {
        1500
    } else if LARGE.iter().any(|k| lowered.contains(k)) {
        5000
    } else {
        1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog(records: Value) -> Value {
        json!({ "jsonData": { "records": records } })
    }

    #[test]
    fn test_parse_minimal_record() {
        let repo = ErcolanoRepository::new();
        let raw = catalog(json!([{
            "id": "77445",
            "nrInventario": "IV-001",
            "oggetto": "anello",
            "modelli3D_hr": ["http://example.test/77445.zip"],
        }]));

        let assets = repo.parse_raw_data(&raw).unwrap();
        assert_eq!(assets.len(), 1);

        let asset = &assets[0];
        assert_eq!(asset.id, "77445");
        assert_eq!(asset.repository, "ercolano");
        assert_eq!(asset.display_name(), "[IV-001] anello");
        assert_eq!(asset.model_urls, vec!["http://example.test/77445.zip"]);
        // base 20 + model urls 20
        assert_eq!(asset.quality_score, 40);
        assert_eq!(asset.file_size_kb, 200);
        assert_eq!(asset.file_format, "obj");
    }

    #[test]
    fn test_records_missing_identity_are_skipped() {
        let repo = ErcolanoRepository::new();
        let raw = catalog(json!([
            { "id": "1" },                       // no inventory
            { "nrInventario": "IV-002" },        // no id
            { "id": "3", "nrInventario": "IV-003" },
        ]));

        let assets = repo.parse_raw_data(&raw).unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].id, "3");
    }

    #[test]
    fn test_scalar_coerced_to_singleton() {
        let repo = ErcolanoRepository::new();
        let raw = catalog(json!([{
            "id": "5",
            "nrInventario": "IV-005",
            "materiaTecnicas": "bronzo",
            "cronologias": ["I sec. d.C.", "II sec. d.C."],
            "modelli3D_hr": { "unexpected": "shape" },
        }]));

        let asset = &repo.parse_raw_data(&raw).unwrap()[0];
        assert_eq!(asset.materials, vec!["bronzo"]);
        assert_eq!(asset.chronology.len(), 2);
        assert!(asset.model_urls.is_empty());
    }

    #[test]
    fn test_quality_score_extremes() {
        let repo = ErcolanoRepository::new();
        let full = catalog(json!([{
            "id": "9",
            "nrInventario": "IV-009",
            "oggetto": "statua",
            "descrizione": "Statua in marmo",
            "materiaTecnicas": ["marmo"],
            "cronologias": ["I sec. d.C."],
            "modelli3D_hr": ["http://example.test/9.zip"],
            "linkDettaglio": "http://example.test/detail/9",
            "linkICCD": "http://example.test/iccd/9",
        }]));
        let asset = &repo.parse_raw_data(&full).unwrap()[0];
        assert_eq!(asset.quality_score, 100);

        let bare = catalog(json!([{ "id": "10", "nrInventario": "IV-010" }]));
        let asset = &repo.parse_raw_data(&bare).unwrap()[0];
        assert_eq!(asset.quality_score, 20);
    }

    #[test]
    fn test_name_falls_back_to_inventory() {
        let repo = ErcolanoRepository::new();
        let raw = catalog(json!([{ "id": "11", "nrInventario": "IV-011" }]));
        let asset = &repo.parse_raw_data(&raw).unwrap()[0];
        assert_eq!(asset.display_name(), "[IV-011] IV-011");
    }

    #[test]
    fn test_unknown_fields_survive_as_metadata() {
        let repo = ErcolanoRepository::new();
        let raw = catalog(json!([{
            "id": "12",
            "nrInventario": "IV-012",
            "sala": "Sala VII",
        }]));
        let asset = &repo.parse_raw_data(&raw).unwrap()[0];
        assert_eq!(asset.metadata.get("sala"), Some(&json!("Sala VII")));
        assert!(!asset.metadata.contains_key("nrInventario"));
    }

    #[test]
    fn test_missing_records_is_parse_error() {
        let repo = ErcolanoRepository::new();
        let err = repo.parse_raw_data(&json!({ "jsonData": {} })).unwrap_err();
        assert!(matches!(err, OpenShelfError::Parse { .. }));
    }

    #[test]
    fn test_file_size_table() {
        assert_eq!(estimate_file_size_kb("moneta romana"), 200);
        assert_eq!(estimate_file_size_kb("vaso a figure nere"), 1500);
        assert_eq!(estimate_file_size_kb("affresco"), 5000);
        assert_eq!(estimate_file_size_kb("lucerna"), 1000);
    }
}
