use indexmap::IndexMap;

use super::instance::EntityInstance;
use super::manifest::{ManifestMap, ManifestValue, name_key};
use crate::table::CellValue;
use treeline_engine::engine::{Uid, UidToken};

/// Instances of one entity type that share a parent.
///
/// Children are keyed by leaf UID in discovery order.
#[derive(Clone, Debug, PartialEq)]
pub struct BreakdownTree {
    entity_type: String,
    parent_uid: Option<Uid>,
    children: IndexMap<UidToken, EntityInstance>,
}

impl BreakdownTree {
    pub fn new(entity_type: &str, parent_uid: Option<Uid>) -> Self {
        BreakdownTree {
            entity_type: entity_type.to_string(),
            parent_uid,
            children: IndexMap::new(),
        }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// UID of the owning instance; `None` for the root tree.
    pub fn parent_uid(&self) -> Option<&Uid> {
        self.parent_uid.as_ref()
    }

    pub fn instances(&self) -> impl Iterator<Item = &EntityInstance> {
        self.children.values()
    }

    pub fn get(&self, leaf: &UidToken) -> Option<&EntityInstance> {
        self.children.get(leaf)
    }

    pub(crate) fn get_mut(&mut self, leaf: &UidToken) -> Option<&mut EntityInstance> {
        self.children.get_mut(leaf)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Attach `instance`; its UID must extend this tree's parent UID by one token.
    pub(crate) fn insert(&mut self, instance: EntityInstance) {
        debug_assert_eq!(instance.uid().parent().as_ref(), self.parent_uid.as_ref());
        self.children.insert(instance.leaf_uid().clone(), instance);
    }

    /// Locate an instance anywhere below this tree by its full UID.
    pub fn find(&self, uid: &Uid) -> Option<&EntityInstance> {
        let tokens = self.relative_tokens(uid)?;
        let (first, rest) = tokens.split_first()?;
        let mut instance = self.children.get(first)?;
        for token in rest {
            instance = instance
                .children()
                .values()
                .find_map(|tree| tree.children.get(token))?;
        }
        Some(instance)
    }

    pub fn find_mut(&mut self, uid: &Uid) -> Option<&mut EntityInstance> {
        let tokens = self.relative_tokens(uid)?;
        let (first, rest) = tokens.split_first()?;
        let mut instance = self.children.get_mut(first)?;
        for token in rest {
            instance = instance
                .children_mut()
                .values_mut()
                .find_map(|tree| tree.children.get_mut(token))?;
        }
        Some(instance)
    }

    /// The sub-tree whose instances are direct children of `parent`
    /// (`None` = this tree itself).
    pub(crate) fn tree_under_mut(&mut self, parent: Option<&Uid>, entity_type: &str) -> Option<&mut BreakdownTree> {
        match parent {
            None => Some(self),
            Some(uid) => Some(self.find_mut(uid)?.child_tree_or_insert(entity_type)),
        }
    }

    /// Every UID at or below this tree, depth first.
    pub fn uids(&self) -> Vec<Uid> {
        let mut out = Vec::new();
        self.collect_uids(&mut out);
        out
    }

    fn collect_uids(&self, out: &mut Vec<Uid>) {
        for instance in self.children.values() {
            out.push(instance.uid().clone());
            for tree in instance.children().values() {
                tree.collect_uids(out);
            }
        }
    }

    /// Nested ordered maps keyed by leaf UID, each followed by a
    /// `<leaf>-name` entry holding the display name.
    pub fn as_dicts(&self) -> ManifestMap {
        let mut map = ManifestMap::new();
        for (leaf, instance) in &self.children {
            map.insert(leaf.to_string(), ManifestValue::Map(instance.as_dict()));
            map.insert(
                name_key(&leaf.to_string()),
                ManifestValue::Scalar(CellValue::Text(instance.name().to_string())),
            );
        }
        map
    }

    fn relative_tokens<'u>(&self, uid: &'u Uid) -> Option<&'u [UidToken]> {
        match &self.parent_uid {
            Some(parent) if !parent.is_ancestor_of(uid) => None,
            Some(parent) => Some(&uid.tokens()[parent.depth()..]),
            None => Some(uid.tokens()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> Uid {
        s.parse().unwrap()
    }

    fn sample() -> BreakdownTree {
        let mut root = BreakdownTree::new("A", None);
        root.insert(EntityInstance::new(uid("A1"), "first"));
        root.insert(EntityInstance::new(uid("A2"), "second"));
        let tree = root.tree_under_mut(Some(&uid("A2")), "B").unwrap();
        tree.insert(EntityInstance::new(uid("A2.B1"), "inner"));
        root
    }

    #[test]
    fn test_find_nested() {
        let root = sample();
        assert_eq!(root.find(&uid("A1")).unwrap().name(), "first");
        assert_eq!(root.find(&uid("A2.B1")).unwrap().name(), "inner");
        assert!(root.find(&uid("A2.B2")).is_none());
        assert!(root.find(&uid("A3")).is_none());
    }

    #[test]
    fn test_find_from_subtree() {
        let root = sample();
        let sub = root.find(&uid("A2")).unwrap().child_tree("B").unwrap();
        assert_eq!(sub.find(&uid("A2.B1")).unwrap().name(), "inner");
        assert!(sub.find(&uid("A1")).is_none());
    }

    #[test]
    fn test_find_mut_updates() {
        let mut root = sample();
        root.find_mut(&uid("A2.B1"))
            .unwrap()
            .set_property("height", CellValue::Number(5.0));
        assert_eq!(
            root.find(&uid("A2.B1")).unwrap().property("height"),
            Some(&CellValue::Number(5.0))
        );
    }

    #[test]
    fn test_uids_depth_first() {
        let root = sample();
        let uids: Vec<String> = root.uids().iter().map(ToString::to_string).collect();
        assert_eq!(uids, vec!["A1", "A2", "A2.B1"]);
    }

    #[test]
    fn test_as_dicts_has_name_keys() {
        let root = sample();
        let dicts = root.as_dicts();
        let keys: Vec<&str> = dicts.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["A1", "A1-name", "A2", "A2-name"]);
    }
}
