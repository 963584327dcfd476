//! JSON manifest import/export.

use std::fs;
use std::path::Path;

use crate::error::{Result, TreelineError};
use crate::tree::{ManifestMap, ManifestValue};

/// Write a manifest as pretty-printed JSON, keys in tree order.
pub fn write_manifest(path: &Path, manifest: &ManifestMap) -> Result<()> {
    let mut content = manifest_to_string(manifest)?;
    content.push('\n');
    fs::write(path, content)?;
    Ok(())
}

pub fn manifest_to_string(manifest: &ManifestMap) -> Result<String> {
    Ok(serde_json::to_string_pretty(manifest)?)
}

/// Read a manifest written by [`write_manifest`].
pub fn read_manifest(path: &Path) -> Result<ManifestMap> {
    let content = fs::read_to_string(path)?;
    manifest_from_str(&content).map_err(|err| match err {
        TreelineError::InvalidManifest { path: inner, message } if inner.is_empty() => {
            TreelineError::InvalidManifest {
                path: path.display().to_string(),
                message,
            }
        }
        other => other,
    })
}

pub fn manifest_from_str(content: &str) -> Result<ManifestMap> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    match ManifestValue::try_from(value)? {
        ManifestValue::Map(map) => Ok(map),
        ManifestValue::Scalar(_) => Err(TreelineError::InvalidManifest {
            path: String::new(),
            message: "top level must be an object".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::CellValue;
    use crate::tree::Breakdown;

    #[test]
    fn test_manifest_json_keeps_key_order() {
        let mut tree = Breakdown::new("Big Rock");
        let br = tree
            .dock(None, "Big Rock", "Growth", vec![("Effort".to_string(), CellValue::Number(3.0))])
            .unwrap();
        tree.dock(Some(&br), "Sub Rock", "Hiring", Vec::new()).unwrap();

        let json = manifest_to_string(&tree.as_dicts()).unwrap();
        let uid_at = json.find("\"UID\"").unwrap();
        let name_at = json.find("\"name\"").unwrap();
        let effort_at = json.find("\"Effort\"").unwrap();
        let sub_at = json.find("\"Sub Rock\"").unwrap();
        assert!(uid_at < name_at && name_at < effort_at && effort_at < sub_at);
        assert!(json.contains("\"BR1-name\": \"Growth\""));
        assert!(json.contains("\"Effort\": 3.0"));
    }

    #[test]
    fn test_manifest_text_round_trip() {
        let mut tree = Breakdown::new("Big Rock");
        let br = tree.dock(None, "Big Rock", "Growth", Vec::new()).unwrap();
        tree.dock(Some(&br), "Sub Rock", "Hiring", Vec::new()).unwrap();

        let json = manifest_to_string(&tree.as_dicts()).unwrap();
        let back = manifest_from_str(&json).unwrap();
        let rebuilt = Breakdown::from_manifest("Big Rock", &back).unwrap();
        assert_eq!(rebuilt.as_dicts(), tree.as_dicts());
        assert_eq!(rebuilt.find(&"BR1.SR1".parse().unwrap()).unwrap().name(), "Hiring");
    }

    #[test]
    fn test_manifest_from_str_rejects_scalars() {
        assert!(matches!(
            manifest_from_str("42"),
            Err(TreelineError::InvalidManifest { .. })
        ));
        assert!(matches!(manifest_from_str("{"), Err(TreelineError::Json(_))));
    }
}
