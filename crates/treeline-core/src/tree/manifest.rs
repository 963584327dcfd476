//! Nested-map form of a tree, as handed to the manifest serializer.
//!
//! ```text
//! { "A1": { "UID": "A1", "name": "a1", "color": "red",
//!           "B": { "B1": {...}, "B1-name": "b1" } },
//!   "A1-name": "a1" }
//! ```
//!
//! [`Breakdown::from_manifest`] reads the same shape back, seeding the UID
//! allocator and acronym table so later ingestion respects prior identifiers.

use indexmap::IndexMap;
use serde::Serialize;

use super::breakdown::Breakdown;
use super::instance::EntityInstance;
use super::subtree::BreakdownTree;
use crate::error::{Result, TreelineError};
use crate::table::CellValue;
use treeline_engine::engine::{Uid, UidToken};

pub(crate) const UID_KEY: &str = "UID";
pub(crate) const NAME_KEY: &str = "name";
const NAME_SUFFIX: &str = "-name";

pub type ManifestMap = IndexMap<String, ManifestValue>;

/// A scalar cell or a nested map.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ManifestValue {
    Scalar(CellValue),
    Map(ManifestMap),
}

impl ManifestValue {
    pub fn as_map(&self) -> Option<&ManifestMap> {
        match self {
            ManifestValue::Map(map) => Some(map),
            ManifestValue::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&CellValue> {
        match self {
            ManifestValue::Scalar(value) => Some(value),
            ManifestValue::Map(_) => None,
        }
    }
}

impl TryFrom<serde_json::Value> for ManifestValue {
    type Error = TreelineError;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        use serde_json::Value;
        Ok(match value {
            Value::Null => ManifestValue::Scalar(CellValue::Empty),
            Value::Bool(b) => ManifestValue::Scalar(CellValue::Text(b.to_string())),
            Value::Number(n) => match n.as_f64() {
                Some(f) => ManifestValue::Scalar(CellValue::Number(f)),
                None => ManifestValue::Scalar(CellValue::Text(n.to_string())),
            },
            Value::String(s) => ManifestValue::Scalar(CellValue::Text(s)),
            Value::Array(_) => {
                return Err(TreelineError::InvalidManifest {
                    path: String::new(),
                    message: "lists are not part of the manifest shape".to_string(),
                });
            }
            Value::Object(object) => ManifestValue::Map(
                object
                    .into_iter()
                    .map(|(k, v)| Ok((k, ManifestValue::try_from(v)?)))
                    .collect::<Result<ManifestMap>>()?,
            ),
        })
    }
}

/// Key of the display-name entry that follows each instance.
pub(crate) fn name_key(leaf: &str) -> String {
    format!("{}{}", leaf, NAME_SUFFIX)
}

impl Breakdown {
    /// Rebuild a tree from the output of [`Breakdown::as_dicts`].
    pub fn from_manifest(root_entity: &str, manifest: &ManifestMap) -> Result<Breakdown> {
        let mut breakdown = Breakdown::new(root_entity);
        let mut root = BreakdownTree::new(root_entity, None);
        load_tree(&mut breakdown, &mut root, manifest, root_entity)?;
        breakdown.root = root;
        tracing::debug!(
            root = root_entity,
            uids = breakdown.allocator.len(),
            "loaded prior manifest"
        );
        Ok(breakdown)
    }
}

fn load_tree(
    breakdown: &mut Breakdown,
    tree: &mut BreakdownTree,
    manifest: &ManifestMap,
    path: &str,
) -> Result<()> {
    for (key, value) in manifest {
        match value {
            ManifestValue::Scalar(_) if key.ends_with(NAME_SUFFIX) => continue,
            ManifestValue::Scalar(_) => {
                return Err(invalid(path, format!("unexpected scalar entry '{}'", key)));
            }
            ManifestValue::Map(entry) => {
                let instance = load_instance(breakdown, tree, key, entry, path)?;
                tree.insert(instance);
            }
        }
    }
    Ok(())
}

fn load_instance(
    breakdown: &mut Breakdown,
    tree: &BreakdownTree,
    key: &str,
    entry: &ManifestMap,
    path: &str,
) -> Result<EntityInstance> {
    let here = format!("{}/{}", path, key);
    let uid_text = entry
        .get(UID_KEY)
        .and_then(ManifestValue::as_scalar)
        .and_then(CellValue::as_text)
        .ok_or_else(|| invalid(&here, "missing 'UID'".to_string()))?;
    let uid: Uid = uid_text
        .parse()
        .map_err(|e| invalid(&here, format!("{}", e)))?;

    let leaf: UidToken = key.parse().map_err(|e| invalid(&here, format!("{}", e)))?;
    if uid.leaf() != &leaf || uid.parent().as_ref() != tree.parent_uid() {
        return Err(invalid(
            &here,
            format!("UID '{}' does not match its position in the tree", uid),
        ));
    }

    breakdown
        .allocator
        .acronyms_mut()
        .register(tree.entity_type(), leaf.acronym())
        .map_err(|e| invalid(&here, format!("{}", e)))?;
    if !breakdown.allocator.seed(&uid)? {
        return Err(invalid(&here, format!("duplicate UID '{}'", uid)));
    }

    let name = entry
        .get(NAME_KEY)
        .and_then(ManifestValue::as_scalar)
        .and_then(CellValue::as_text)
        .unwrap_or_default();
    let mut instance = EntityInstance::new(uid.clone(), &name);

    for (field, value) in entry {
        match value {
            _ if field == UID_KEY || field == NAME_KEY => {}
            ManifestValue::Scalar(cell) => instance.set_property(field, cell.clone()),
            ManifestValue::Map(sub) => {
                let child = instance.child_tree_or_insert(field);
                load_tree(breakdown, child, sub, &here)?;
            }
        }
    }
    Ok(instance)
}

fn invalid(path: &str, message: String) -> TreelineError {
    TreelineError::InvalidManifest {
        path: path.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest(value: serde_json::Value) -> ManifestMap {
        match ManifestValue::try_from(value).unwrap() {
            ManifestValue::Map(map) => map,
            ManifestValue::Scalar(_) => panic!("expected a map"),
        }
    }

    fn sample() -> ManifestMap {
        manifest(json!({
            "BR1": {
                "UID": "BR1",
                "name": "Growth",
                "Owner": "ops",
                "Sub Rock": {
                    "SR3": { "UID": "BR1.SR3", "name": "Hiring", "Effort": 4 },
                    "SR3-name": "Hiring"
                }
            },
            "BR1-name": "Growth"
        }))
    }

    #[test]
    fn test_load_restores_instances() {
        let tree = Breakdown::from_manifest("Big Rock", &sample()).unwrap();
        let sr = tree.find(&"BR1.SR3".parse().unwrap()).unwrap();
        assert_eq!(sr.name(), "Hiring");
        assert_eq!(sr.property("Effort"), Some(&CellValue::Number(4.0)));
        assert_eq!(tree.acronym("Sub Rock"), Some("SR"));
        assert_eq!(tree.acronym("Big Rock"), Some("BR"));
        assert!(tree.allocator().contains(&"BR1.SR3".parse().unwrap()));
    }

    #[test]
    fn test_load_then_as_dicts_is_identity() {
        let original = sample();
        let tree = Breakdown::from_manifest("Big Rock", &original).unwrap();
        assert_eq!(tree.as_dicts(), original);
    }

    #[test]
    fn test_seeded_allocator_appends() {
        let mut tree = Breakdown::from_manifest("Big Rock", &sample()).unwrap();
        let parent: Uid = "BR1".parse().unwrap();
        let uid = tree.dock(Some(&parent), "Sub Rock", "Retention", Vec::new()).unwrap();
        assert_eq!(uid.to_string(), "BR1.SR4");
    }

    #[test]
    fn test_misplaced_uid_rejected() {
        let bad = manifest(json!({
            "BR1": { "UID": "BR2", "name": "x" }
        }));
        assert!(matches!(
            Breakdown::from_manifest("Big Rock", &bad),
            Err(TreelineError::InvalidManifest { .. })
        ));
    }

    #[test]
    fn test_arrays_rejected() {
        assert!(ManifestValue::try_from(json!({ "BR1": [1, 2] })).is_err());
    }
}
