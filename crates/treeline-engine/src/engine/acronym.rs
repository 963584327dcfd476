//! Acronym derivation for entity types.
//!
//! An acronym is built from the initials of each word of the entity-type name,
//! ignoring parenthesised asides. On collision the number of letters taken from
//! each word grows; once every word is exhausted the last word's initial is
//! repeated until the candidate is free.
//!
//! ```ignore
//! // with "A", "B" and "C" already taken
//! "Costs"         -> "CO"
//! "Cost Models"   -> "CM"
//! "Carry Mirrors" -> "CAMI"
//! "CO"            -> "COC"
//! ```

use indexmap::IndexMap;
use std::collections::HashMap;

use super::header::strip_parentheticals;
use super::uid::validate_acronym;
use crate::error::{EngineError, Result};

/// Derive an acronym for `entity_type` that `taken` does not reject.
pub fn derive_acronym(entity_type: &str, taken: impl Fn(&str) -> bool) -> Result<String> {
    let words: Vec<Vec<char>> = strip_parentheticals(entity_type)
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_ascii_uppercase().chars().collect())
        .collect();

    if words.is_empty() {
        return Err(EngineError::UnknownAcronymSyntax {
            acronym: entity_type.to_string(),
        });
    }

    let longest = words.iter().map(Vec::len).max().unwrap_or(1);
    for width in 1..=longest {
        let candidate: String = words
            .iter()
            .flat_map(|w| w.iter().take(width))
            .collect();
        if !taken(&candidate) {
            return Ok(candidate);
        }
    }

    // Saturated: every word is used in full.
    let mut candidate: String = words.iter().flatten().collect();
    let filler = words[words.len() - 1][0];
    loop {
        candidate.push(filler);
        if !taken(&candidate) {
            return Ok(candidate);
        }
    }
}

/// Bijective entity-type to acronym assignment for one tree.
///
/// Assignments are created lazily and never change for the table's lifetime.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AcronymTable {
    by_entity: IndexMap<String, String>,
    by_acronym: HashMap<String, String>,
}

impl AcronymTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acronym for `entity_type`, assigning one the first time it is seen.
    pub fn acronym_for(&mut self, entity_type: &str) -> Result<String> {
        if let Some(existing) = self.by_entity.get(entity_type) {
            return Ok(existing.clone());
        }
        let acronym = derive_acronym(entity_type, |c| self.by_acronym.contains_key(c))?;
        self.insert(entity_type, &acronym);
        Ok(acronym)
    }

    /// Record a known assignment, e.g. one observed in a previously persisted tree.
    pub fn register(&mut self, entity_type: &str, acronym: &str) -> Result<()> {
        validate_acronym(acronym)?;
        if let Some(existing) = self.by_entity.get(entity_type) {
            if existing == acronym {
                return Ok(());
            }
            return Err(EngineError::AcronymConflict {
                entity: entity_type.to_string(),
                acronym: acronym.to_string(),
                existing: format!("{} (as {})", entity_type, existing),
            });
        }
        if let Some(owner) = self.by_acronym.get(acronym) {
            return Err(EngineError::AcronymConflict {
                entity: entity_type.to_string(),
                acronym: acronym.to_string(),
                existing: owner.clone(),
            });
        }
        self.insert(entity_type, acronym);
        Ok(())
    }

    pub fn get(&self, entity_type: &str) -> Option<&str> {
        self.by_entity.get(entity_type).map(String::as_str)
    }

    /// Entity type owning `acronym`, if any.
    pub fn entity_for(&self, acronym: &str) -> Option<&str> {
        self.by_acronym.get(acronym).map(String::as_str)
    }

    /// Assignments in the order they were made.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_entity.iter().map(|(e, a)| (e.as_str(), a.as_str()))
    }

    pub fn len(&self) -> usize {
        self.by_entity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_entity.is_empty()
    }

    fn insert(&mut self, entity_type: &str, acronym: &str) {
        self.by_entity
            .insert(entity_type.to_string(), acronym.to_string());
        self.by_acronym
            .insert(acronym.to_string(), entity_type.to_string());
    }
}
