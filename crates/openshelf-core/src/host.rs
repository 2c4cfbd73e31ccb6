//! Contracts the embedding application provides.
//!
//! The core never talks to a scene graph directly. The host hands it a
//! [`ModelImporter`] and a [`SceneStateStore`]; imported models come back as
//! [`SceneObject`] handles the core annotates and selects. All three traits
//! are called from the UI thread only.

use crate::asset::CulturalAsset;
use crate::error::Result;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Options forwarded to the host importer.
#[derive(Debug, Clone)]
pub struct ImportSettings {
    /// Uniform scale applied on import, 1.0 = unchanged.
    pub import_scale: f32,
    pub auto_center: bool,
    pub apply_materials: bool,
    /// Attach `openshelf_*` annotations after import.
    pub add_metadata: bool,
    pub recalculate_normals: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            import_scale: 1.0,
            auto_center: true,
            apply_materials: true,
            add_metadata: true,
            recalculate_normals: false,
        }
    }
}

/// A custom-property value on a scene object.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Str(s) => write!(f, "{s}"),
            PropertyValue::Int(i) => write!(f, "{i}"),
            PropertyValue::Float(x) => write!(f, "{x}"),
            PropertyValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Str(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Str(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Int(i)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

/// Handle to an object the host placed in its scene.
pub trait SceneObject {
    fn name(&self) -> String;
    fn set_name(&mut self, name: &str);
    fn set_custom_property(&mut self, key: &str, value: PropertyValue);
    fn custom_property(&self, key: &str) -> Option<PropertyValue>;
    /// Make this object the active selection.
    fn select(&mut self);
}

/// Imports a local 3D file (`.obj`, `.gltf`, `.glb`) into the host scene.
/// UI thread only.
pub trait ModelImporter {
    fn import(&mut self, path: &Path, settings: &ImportSettings) -> Result<Box<dyn SceneObject>>;
}

/// UI-visible state the core reads and writes. Hosts back this with their
/// own scene properties; writes happen from the UI timer only.
pub trait SceneStateStore {
    fn active_repository(&self) -> String;
    fn search_text(&self) -> String;
    fn filter_object_type(&self) -> String;
    fn filter_material(&self) -> String;
    fn filter_chronology(&self) -> String;
    fn filter_inventory(&self) -> String;

    fn search_results(&self) -> Vec<CulturalAsset>;
    fn set_search_results(&mut self, results: Vec<CulturalAsset>);
    fn assets_cache(&self) -> Vec<CulturalAsset>;
    fn set_assets_cache(&mut self, assets: Vec<CulturalAsset>);

    fn selected_result_index(&self) -> usize;
    fn set_selected_result_index(&mut self, index: usize);

    fn is_searching(&self) -> bool;
    fn set_is_searching(&mut self, searching: bool);
    fn is_downloading(&self) -> bool;
    fn set_is_downloading(&mut self, downloading: bool);

    fn download_progress(&self) -> u8;
    fn set_download_progress(&mut self, percent: u8);
    fn status_message(&self) -> String;
    fn set_status_message(&mut self, message: &str);

    fn import_settings(&self) -> ImportSettings;
}

/// Plain in-memory store. Hosts without scene-backed properties (and the
/// test suite) use this directly.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    pub active_repository: String,
    pub search_text: String,
    pub filter_object_type: String,
    pub filter_material: String,
    pub filter_chronology: String,
    pub filter_inventory: String,
    pub search_results: Vec<CulturalAsset>,
    pub assets_cache: Vec<CulturalAsset>,
    pub selected_result_index: usize,
    pub is_searching: bool,
    pub is_downloading: bool,
    pub download_progress: u8,
    pub status_message: String,
    pub import_settings: Option<ImportSettings>,
}

impl SceneStateStore for MemoryStateStore {
    fn active_repository(&self) -> String {
        self.active_repository.clone()
    }
    fn search_text(&self) -> String {
        self.search_text.clone()
    }
    fn filter_object_type(&self) -> String {
        self.filter_object_type.clone()
    }
    fn filter_material(&self) -> String {
        self.filter_material.clone()
    }
    fn filter_chronology(&self) -> String {
        self.filter_chronology.clone()
    }
    fn filter_inventory(&self) -> String {
        self.filter_inventory.clone()
    }

    fn search_results(&self) -> Vec<CulturalAsset> {
        self.search_results.clone()
    }
    fn set_search_results(&mut self, results: Vec<CulturalAsset>) {
        self.search_results = results;
    }
    fn assets_cache(&self) -> Vec<CulturalAsset> {
        self.assets_cache.clone()
    }
    fn set_assets_cache(&mut self, assets: Vec<CulturalAsset>) {
        self.assets_cache = assets;
    }

    fn selected_result_index(&self) -> usize {
        self.selected_result_index
    }
    fn set_selected_result_index(&mut self, index: usize) {
        self.selected_result_index = index;
    }

    fn is_searching(&self) -> bool {
        self.is_searching
    }
    fn set_is_searching(&mut self, searching: bool) {
        self.is_searching = searching;
    }
    fn is_downloading(&self) -> bool {
        self.is_downloading
    }
    fn set_is_downloading(&mut self, downloading: bool) {
        self.is_downloading = downloading;
    }

    fn download_progress(&self) -> u8 {
        self.download_progress
    }
    fn set_download_progress(&mut self, percent: u8) {
        self.download_progress = percent.min(100);
    }
    fn status_message(&self) -> String {
        self.status_message.clone()
    }
    fn set_status_message(&mut self, message: &str) {
        self.status_message = message.to_string();
    }

    fn import_settings(&self) -> ImportSettings {
        self.import_settings.clone().unwrap_or_default()
    }
}

/// In-memory scene object: a name plus a custom-property map.
#[derive(Debug, Default)]
pub struct MemorySceneObject {
    name: String,
    properties: HashMap<String, PropertyValue>,
    selected: bool,
}

impl MemorySceneObject {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn properties(&self) -> &HashMap<String, PropertyValue> {
        &self.properties
    }
}

impl SceneObject for MemorySceneObject {
    fn name(&self) -> String {
        self.name.clone()
    }
    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }
    fn set_custom_property(&mut self, key: &str, value: PropertyValue) {
        self.properties.insert(key.to_string(), value);
    }
    fn custom_property(&self, key: &str) -> Option<PropertyValue> {
        self.properties.get(key).cloned()
    }
    fn select(&mut self) {
        self.selected = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_settings_defaults() {
        let settings = ImportSettings::default();
        assert!((settings.import_scale - 1.0).abs() < f32::EPSILON);
        assert!(settings.auto_center);
        assert!(settings.add_metadata);
        assert!(!settings.recalculate_normals);
    }

    #[test]
    fn test_memory_scene_object() {
        let mut object = MemorySceneObject::new("untitled");
        object.set_name("IV-001_anello");
        object.set_custom_property("openshelf_id", "77445".into());
        object.select();

        assert_eq!(object.name(), "IV-001_anello");
        assert_eq!(
            object.custom_property("openshelf_id"),
            Some(PropertyValue::Str("77445".to_string()))
        );
        assert!(object.custom_property("missing").is_none());
        assert!(object.is_selected());
    }

    #[test]
    fn test_memory_store_clamps_progress() {
        let mut store = MemoryStateStore::default();
        store.set_download_progress(250);
        assert_eq!(store.download_progress(), 100);
    }
}
