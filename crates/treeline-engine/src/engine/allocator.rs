//! UID allocation.
//!
//! The allocator is a rooted tree of per-level counters. Each node maps an
//! acronym to the integers already used for it at that level, and each used
//! token owns a child node for the level below it. Minting picks
//! `max(used) + 1`; seeding registers tokens discovered in an earlier run so
//! that fresh allocations never collide with them.
//!
//! One allocator serves a whole tree family, which is what makes UIDs unique
//! across every sub-tree. It also owns the tree's [`AcronymTable`].

use std::collections::{BTreeSet, HashMap};

use super::acronym::AcronymTable;
use super::uid::{Uid, UidToken, validate_acronym};
use crate::error::{EngineError, Result};

/// Deepest UID the allocator will mint or accept.
pub const MAX_UID_DEPTH: usize = 100;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct CounterNode {
    used: HashMap<String, BTreeSet<u32>>,
    children: HashMap<UidToken, CounterNode>,
}

impl CounterNode {
    fn is_used(&self, token: &UidToken) -> bool {
        self.used
            .get(token.acronym())
            .is_some_and(|set| set.contains(&token.index()))
    }
}

/// Stateful, hierarchical UID counter shared by one tree family.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UidAllocator {
    root: CounterNode,
    acronyms: AcronymTable,
    allocated: usize,
}

impl UidAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint the next UID for `acronym` directly under `parent` (`None` = tree root).
    ///
    /// Every token of `parent` must already have been allocated or seeded.
    pub fn next(&mut self, parent: Option<&Uid>, acronym: &str) -> Result<Uid> {
        validate_acronym(acronym)?;
        let depth = parent.map_or(0, Uid::depth) + 1;
        check_depth(depth)?;

        let node = self.node_mut(parent)?;
        let used = node.used.entry(acronym.to_string()).or_default();
        let index = match used.last() {
            None => 1,
            Some(max) => max.checked_add(1).ok_or_else(|| EngineError::InvalidUid {
                text: format!("{}{}", acronym, max),
                reason: "no token integer left after this one".to_string(),
            })?,
        };
        used.insert(index);

        let token = UidToken::new(acronym, index)?;
        node.children.entry(token.clone()).or_default();
        self.allocated += 1;
        Ok(Uid::under(parent, token))
    }

    /// Register every token of a pre-existing `uid` as used without minting.
    ///
    /// Intermediate levels are created as needed. Returns `true` if the leaf
    /// token was not already known.
    pub fn seed(&mut self, uid: &Uid) -> Result<bool> {
        check_depth(uid.depth())?;
        let mut node = &mut self.root;
        let mut fresh = false;
        for token in uid.tokens() {
            fresh = node
                .used
                .entry(token.acronym().to_string())
                .or_default()
                .insert(token.index());
            node = node.children.entry(token.clone()).or_default();
        }
        if fresh {
            self.allocated += 1;
        }
        Ok(fresh)
    }

    /// True if every token of `uid` has been allocated or seeded.
    pub fn contains(&self, uid: &Uid) -> bool {
        let mut node = &self.root;
        for token in uid.tokens() {
            if !node.is_used(token) {
                return false;
            }
            match node.children.get(token) {
                Some(child) => node = child,
                None => return false,
            }
        }
        true
    }

    /// Highest integer used for `acronym` directly under `parent`.
    pub fn last_index(&self, parent: Option<&Uid>, acronym: &str) -> Option<u32> {
        let mut node = &self.root;
        if let Some(parent) = parent {
            for token in parent.tokens() {
                node = node.children.get(token)?;
            }
        }
        node.used.get(acronym)?.last().copied()
    }

    /// Number of distinct UIDs minted or seeded.
    pub fn len(&self) -> usize {
        self.allocated
    }

    pub fn is_empty(&self) -> bool {
        self.allocated == 0
    }

    /// Acronym for `entity_type`, assigned on first use.
    pub fn acronym_for(&mut self, entity_type: &str) -> Result<String> {
        self.acronyms.acronym_for(entity_type)
    }

    pub fn acronyms(&self) -> &AcronymTable {
        &self.acronyms
    }

    pub fn acronyms_mut(&mut self) -> &mut AcronymTable {
        &mut self.acronyms
    }

    fn node_mut(&mut self, parent: Option<&Uid>) -> Result<&mut CounterNode> {
        let mut node = &mut self.root;
        let Some(parent) = parent else {
            return Ok(node);
        };
        for token in parent.tokens() {
            if !node.is_used(token) {
                return Err(EngineError::DanglingParentPath {
                    path: parent.to_string(),
                    token: token.to_string(),
                });
            }
            node = node.children.entry(token.clone()).or_default();
        }
        Ok(node)
    }
}

fn check_depth(depth: usize) -> Result<()> {
    if depth > MAX_UID_DEPTH {
        return Err(EngineError::StructuralLimit {
            depth,
            limit: MAX_UID_DEPTH,
        });
    }
    Ok(())
}
