use indexmap::{IndexMap, IndexSet};

use super::instance::EntityInstance;
use super::manifest::ManifestMap;
use super::subtree::BreakdownTree;
use crate::error::{Result, TreelineError};
use crate::table::CellValue;
use treeline_engine::engine::{Uid, UidAllocator};

/// The global tree: a root [`BreakdownTree`] together with the single
/// [`UidAllocator`] every sub-tree draws its UIDs from.
///
/// It also tracks the most recently created instance per entity type
/// (`last_path`), which is how continuation rows find the entity they inherit
/// from. Entries are UIDs, not references; ownership stays root-to-leaf.
#[derive(Clone, Debug, PartialEq)]
pub struct Breakdown {
    pub(super) root: BreakdownTree,
    pub(super) allocator: UidAllocator,
    pub(super) last_path: IndexMap<String, Uid>,
    /// Entity types in the order ingestion first met their columns.
    pub(super) entity_types: IndexSet<String>,
}

impl Breakdown {
    pub fn new(root_entity: &str) -> Self {
        Self::with_allocator(root_entity, UidAllocator::new())
    }

    /// Start an empty tree whose allocator was seeded elsewhere, e.g. from a
    /// prior tree whose UIDs must never be minted again.
    pub fn with_allocator(root_entity: &str, allocator: UidAllocator) -> Self {
        Breakdown {
            root: BreakdownTree::new(root_entity, None),
            allocator,
            last_path: IndexMap::new(),
            entity_types: IndexSet::new(),
        }
    }

    pub fn root(&self) -> &BreakdownTree {
        &self.root
    }

    pub fn root_entity(&self) -> &str {
        self.root.entity_type()
    }

    pub fn allocator(&self) -> &UidAllocator {
        &self.allocator
    }

    pub fn into_allocator(self) -> UidAllocator {
        self.allocator
    }

    /// Acronym assigned to `entity_type`, if it has been seen.
    pub fn acronym(&self, entity_type: &str) -> Option<&str> {
        self.allocator.acronyms().get(entity_type)
    }

    pub fn find(&self, uid: &Uid) -> Option<&EntityInstance> {
        self.root.find(uid)
    }

    /// Most recently created (or merged) instance of `entity_type`.
    pub fn last_of(&self, entity_type: &str) -> Option<&Uid> {
        self.last_path.get(entity_type)
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.entity_types.iter().map(String::as_str)
    }

    pub fn uids(&self) -> Vec<Uid> {
        self.root.uids()
    }

    /// Total number of instances in the tree.
    pub fn len(&self) -> usize {
        self.uids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn as_dicts(&self) -> ManifestMap {
        self.root.as_dicts()
    }

    /// Attach a new instance of `entity_type` under `parent` (`None` = root)
    /// outside of row ingestion.
    ///
    /// Unlike tabular ingestion this may branch one parent into several
    /// sub-entity types.
    pub fn dock<I>(&mut self, parent: Option<&Uid>, entity_type: &str, name: &str, properties: I) -> Result<Uid>
    where
        I: IntoIterator<Item = (String, CellValue)>,
    {
        match parent {
            None if entity_type != self.root.entity_type() => {
                return Err(TreelineError::RootEntityMismatch {
                    expected: self.root.entity_type().to_string(),
                    found: entity_type.to_string(),
                });
            }
            Some(uid) if self.root.find(uid).is_none() => {
                return Err(TreelineError::UnknownParent {
                    uid: uid.to_string(),
                });
            }
            _ => {}
        }

        let acronym = self.allocator.acronym_for(entity_type)?;
        let uid = self.allocator.next(parent, &acronym)?;
        let mut instance = EntityInstance::new(uid.clone(), name);
        for (key, value) in properties {
            instance.set_property(&key, value);
        }

        let tree = self
            .root
            .tree_under_mut(parent, entity_type)
            .ok_or_else(|| TreelineError::UnknownParent {
                uid: parent.map(ToString::to_string).unwrap_or_default(),
            })?;
        tree.insert(instance);
        self.remember(entity_type, parent, &uid);
        Ok(uid)
    }

    /// Forget continuation state, so the first rows of a new table cannot
    /// inherit from the last rows of an earlier one.
    pub(crate) fn clear_continuation(&mut self) {
        self.last_path.clear();
        self.entity_types.clear();
    }

    /// Record `uid` as the current instance of `entity_type`, forgetting
    /// every remembered instance below `parent` (they belonged to a sibling).
    pub(super) fn remember(&mut self, entity_type: &str, parent: Option<&Uid>, uid: &Uid) {
        self.last_path.retain(|_, last| match parent {
            Some(parent) => !parent.is_ancestor_of(last),
            None => false,
        });
        self.last_path.insert(entity_type.to_string(), uid.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dock_mints_under_parent() {
        let mut tree = Breakdown::new("A");
        let a1 = tree.dock(None, "A", "first", Vec::new()).unwrap();
        let b1 = tree
            .dock(Some(&a1), "B", "inner", vec![("height".to_string(), CellValue::Number(2.0))])
            .unwrap();
        assert_eq!(b1.to_string(), "A1.B1");
        assert_eq!(tree.find(&b1).unwrap().property("height"), Some(&CellValue::Number(2.0)));
        assert_eq!(tree.last_of("B"), Some(&b1));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_dock_allows_multiple_sub_entity_types() {
        let mut tree = Breakdown::new("A");
        let a1 = tree.dock(None, "A", "first", Vec::new()).unwrap();
        tree.dock(Some(&a1), "B", "b", Vec::new()).unwrap();
        tree.dock(Some(&a1), "Costs", "c", Vec::new()).unwrap();
        assert_eq!(tree.find(&a1).unwrap().children().len(), 2);
    }

    #[test]
    fn test_dock_rejects_unknown_parent() {
        let mut tree = Breakdown::new("A");
        let err = tree
            .dock(Some(&"A9".parse().unwrap()), "B", "orphan", Vec::new())
            .unwrap_err();
        assert!(matches!(err, TreelineError::UnknownParent { .. }));
        assert!(tree.allocator().is_empty());
    }

    #[test]
    fn test_new_parent_forgets_deeper_instances() {
        let mut tree = Breakdown::new("A");
        let a1 = tree.dock(None, "A", "a", Vec::new()).unwrap();
        let b1 = tree.dock(Some(&a1), "B", "b", Vec::new()).unwrap();
        tree.dock(Some(&b1), "C", "c", Vec::new()).unwrap();
        assert!(tree.last_of("C").is_some());
        let b2 = tree.dock(Some(&a1), "B", "b2", Vec::new()).unwrap();
        assert_eq!(tree.last_of("B"), Some(&b2));
        assert_eq!(tree.last_of("A"), Some(&a1));
        assert!(tree.last_of("C").is_none());
    }
}
