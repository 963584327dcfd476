use indexmap::IndexMap;

use super::manifest::{ManifestMap, ManifestValue, NAME_KEY, UID_KEY};
use super::subtree::BreakdownTree;
use crate::table::CellValue;
use treeline_engine::engine::{Uid, UidToken};

/// One concrete occurrence of an entity type.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityInstance {
    uid: Uid,
    name: String,
    properties: IndexMap<String, CellValue>,
    children: IndexMap<String, BreakdownTree>,
}

impl EntityInstance {
    pub fn new(uid: Uid, name: &str) -> Self {
        EntityInstance {
            uid,
            name: name.to_string(),
            properties: IndexMap::new(),
            children: IndexMap::new(),
        }
    }

    pub fn uid(&self) -> &Uid {
        &self.uid
    }

    pub fn leaf_uid(&self) -> &UidToken {
        self.uid.leaf()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &IndexMap<String, CellValue> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&CellValue> {
        self.properties.get(name)
    }

    /// Sub-entity trees keyed by sub-entity type.
    pub fn children(&self) -> &IndexMap<String, BreakdownTree> {
        &self.children
    }

    pub fn child_tree(&self, entity_type: &str) -> Option<&BreakdownTree> {
        self.children.get(entity_type)
    }

    pub(crate) fn children_mut(&mut self) -> &mut IndexMap<String, BreakdownTree> {
        &mut self.children
    }

    pub(crate) fn rename(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Set a property, overwriting any earlier value.
    pub fn set_property(&mut self, name: &str, value: CellValue) {
        self.properties.insert(name.to_string(), value);
    }

    /// Overwrite a property only with a non-blank value.
    pub(crate) fn merge_property(&mut self, name: &str, value: CellValue) {
        if value.is_blank() && self.properties.contains_key(name) {
            return;
        }
        self.set_property(name, value);
    }

    /// The sub-tree for `entity_type`, created empty on first use.
    pub fn child_tree_or_insert(&mut self, entity_type: &str) -> &mut BreakdownTree {
        let uid = self.uid.clone();
        self.children
            .entry(entity_type.to_string())
            .or_insert_with(|| BreakdownTree::new(entity_type, Some(uid)))
    }

    /// `{ "UID": ..., "name": ..., <props>..., <sub entity type>: {...} }`
    pub fn as_dict(&self) -> ManifestMap {
        let mut map = ManifestMap::new();
        map.insert(
            UID_KEY.to_string(),
            ManifestValue::Scalar(CellValue::Text(self.uid.to_string())),
        );
        map.insert(
            NAME_KEY.to_string(),
            ManifestValue::Scalar(CellValue::Text(self.name.clone())),
        );
        for (key, value) in &self.properties {
            map.insert(key.clone(), ManifestValue::Scalar(value.clone()));
        }
        for (entity_type, tree) in &self.children {
            map.insert(entity_type.clone(), ManifestValue::Map(tree.as_dicts()));
        }
        map
    }
}
