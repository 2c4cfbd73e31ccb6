//! `openshelf_*` annotations attached to imported scene objects.

use crate::asset::CulturalAsset;
use crate::host::{PropertyValue, SceneObject};
use crate::library::sanitize_asset_id;
use serde_json::Value;

const PREFIX: &str = "openshelf_";
const META_PREFIX: &str = "openshelf_meta_";

/// Annotate `object` with the asset's fields and rename it to
/// `{inventory_number}_{object_type}` (unsafe characters become `_`).
///
/// Scalars go in as strings, sequences as comma-joined strings, numerics as
/// their native types. Empty fields are omitted. Scalar entries of the
/// asset's free-form `metadata` map land under `openshelf_meta_<key>`.
pub fn attach_cultural_metadata(object: &mut dyn SceneObject, asset: &CulturalAsset) {
    set_str(object, "id", &asset.id);
    set_str(object, "name", &asset.name);
    set_str(object, "description", &asset.description);
    set_str(object, "repository", &asset.repository);
    set_str(object, "object_type", &asset.object_type);
    set_str(object, "inventory_number", &asset.inventory_number);
    set_str(object, "provenance", &asset.provenance);
    set_str(object, "license", &asset.license_info);
    set_str(object, "file_format", &asset.file_format);
    set_str(object, "import_timestamp", &chrono::Utc::now().to_rfc3339());

    set_joined(object, "materials", &asset.materials);
    set_joined(object, "chronology", &asset.chronology);
    set_joined(object, "tags", &asset.tags);
    set_joined(object, "model_urls", &asset.model_urls);

    object.set_custom_property(
        &format!("{PREFIX}quality_score"),
        PropertyValue::Int(asset.quality_score as i64),
    );
    if asset.file_size_kb > 0 {
        object.set_custom_property(
            &format!("{PREFIX}file_size"),
            PropertyValue::Int(asset.file_size_kb as i64),
        );
    }
    object.set_custom_property(
        &format!("{PREFIX}has_textures"),
        PropertyValue::Bool(asset.has_textures),
    );

    for (key, value) in &asset.metadata {
        let value = match value {
            Value::String(s) if !s.trim().is_empty() => PropertyValue::Str(s.clone()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PropertyValue::Int(i),
                None => PropertyValue::Float(n.as_f64().unwrap_or(0.0)),
            },
            Value::Bool(b) => PropertyValue::Bool(*b),
            _ => continue,
        };
        object.set_custom_property(&format!("{META_PREFIX}{key}"), value);
    }

    if let Some(name) = object_name(asset) {
        object.set_name(&name);
    }
}

fn object_name(asset: &CulturalAsset) -> Option<String> {
    let parts: Vec<&str> = [asset.inventory_number.as_str(), asset.object_type.as_str()]
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(sanitize_asset_id(&parts.join("_")))
}

fn set_str(object: &mut dyn SceneObject, field: &str, value: &str) {
    if value.trim().is_empty() {
        return;
    }
    object.set_custom_property(
        &format!("{PREFIX}{field}"),
        PropertyValue::Str(value.to_string()),
    );
}

fn set_joined(object: &mut dyn SceneObject, field: &str, values: &[String]) {
    if values.is_empty() {
        return;
    }
    object.set_custom_property(
        &format!("{PREFIX}{field}"),
        PropertyValue::Str(values.join(", ")),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemorySceneObject;

    fn sample_asset() -> CulturalAsset {
        let mut asset = CulturalAsset::new("77445", "ercolano").unwrap();
        asset.inventory_number = "IV-001".to_string();
        asset.object_type = "anello".to_string();
        asset.name = "anello".to_string();
        asset.materials = vec!["oro".to_string(), "gemma".to_string()];
        asset.model_urls = vec!["http://example.test/77445.zip".to_string()];
        asset.quality_score = 55;
        asset.file_size_kb = 200;
        asset
            .metadata
            .insert("sala".to_string(), serde_json::json!("XII"));
        asset
            .metadata
            .insert("anno_scavo".to_string(), serde_json::json!(1927));
        asset
            .metadata
            .insert("shape".to_string(), serde_json::json!({"nested": true}));
        asset
    }

    #[test]
    fn test_attach_scalars_sequences_numerics() {
        let mut object = MemorySceneObject::new("imported");
        attach_cultural_metadata(&mut object, &sample_asset());

        assert_eq!(
            object.custom_property("openshelf_inventory_number"),
            Some(PropertyValue::Str("IV-001".to_string()))
        );
        assert_eq!(
            object.custom_property("openshelf_materials"),
            Some(PropertyValue::Str("oro, gemma".to_string()))
        );
        assert_eq!(
            object.custom_property("openshelf_quality_score"),
            Some(PropertyValue::Int(55))
        );
        assert_eq!(
            object.custom_property("openshelf_has_textures"),
            Some(PropertyValue::Bool(false))
        );
        assert!(object.custom_property("openshelf_import_timestamp").is_some());
    }

    #[test]
    fn test_empty_fields_omitted() {
        let mut object = MemorySceneObject::new("imported");
        attach_cultural_metadata(&mut object, &sample_asset());

        // description and provenance are empty on the sample asset
        assert!(object.custom_property("openshelf_description").is_none());
        assert!(object.custom_property("openshelf_provenance").is_none());
        assert!(object.custom_property("openshelf_tags").is_none());
    }

    #[test]
    fn test_metadata_scalars_only() {
        let mut object = MemorySceneObject::new("imported");
        attach_cultural_metadata(&mut object, &sample_asset());

        assert_eq!(
            object.custom_property("openshelf_meta_sala"),
            Some(PropertyValue::Str("XII".to_string()))
        );
        assert_eq!(
            object.custom_property("openshelf_meta_anno_scavo"),
            Some(PropertyValue::Int(1927))
        );
        assert!(object.custom_property("openshelf_meta_shape").is_none());
    }

    #[test]
    fn test_object_renamed() {
        let mut object = MemorySceneObject::new("imported");
        attach_cultural_metadata(&mut object, &sample_asset());
        assert_eq!(object.name(), "IV-001_anello");
    }

    #[test]
    fn test_rename_skipped_when_nothing_to_name() {
        let mut object = MemorySceneObject::new("imported");
        let asset = CulturalAsset::new("77445", "ercolano").unwrap();
        attach_cultural_metadata(&mut object, &asset);
        assert_eq!(object.name(), "imported");
    }
}
