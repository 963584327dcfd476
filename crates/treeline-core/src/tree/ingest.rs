//! Row ingestion.
//!
//! Reads the cells one [`Interval`] covers in one row and decides whether they
//! introduce a new entity instance, continue the instance established by an
//! earlier row (blank entity cell), or update an existing instance under the
//! merge policy.
//!
//! Rows must be fed in table order and, within a row, intervals outermost
//! first: docking looks up ancestors that earlier calls recorded.

use super::breakdown::Breakdown;
use super::clean::{CellCleaner, NoCleanup};
use super::instance::EntityInstance;
use super::policy::UpdatePolicy;
use crate::error::{Result, TreelineError};
use crate::table::{CellValue, Row};
use treeline_engine::engine::{Interval, Uid, is_uid_column};

/// The validated cells of one interval in one row.
struct Fragment<'r> {
    name: Option<String>,
    uid: Option<&'r CellValue>,
    properties: Vec<(&'r str, &'r CellValue)>,
}

impl<'r> Fragment<'r> {
    fn read(interval: &'r Interval, row: &Row<'r>) -> Result<Fragment<'r>> {
        let missing: Vec<String> = interval
            .data_columns()
            .filter(|c| !row.has_column(c))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(TreelineError::MissingColumns {
                row: row.index(),
                missing,
            });
        }

        let entity = interval.entity_column();
        let count = row.occurrences(entity);
        if count != 1 {
            return Err(TreelineError::EntityColumnCount {
                row: row.index(),
                column: entity.to_string(),
                count,
            });
        }

        let name = row.get(entity).and_then(CellValue::as_text);
        let uid = interval.uid_column().and_then(|c| row.get(c));
        let properties: Vec<(&str, &CellValue)> = interval
            .property_columns()
            .filter_map(|c| row.get(c).map(|v| (c, v)))
            .collect();

        if name.is_none() {
            let populated: Vec<String> = properties
                .iter()
                .filter(|(_, v)| !v.is_blank())
                .map(|(c, _)| c.to_string())
                .chain(
                    interval
                        .uid_column()
                        .filter(|_| uid.is_some_and(|v| !v.is_blank()))
                        .map(str::to_string),
                )
                .collect();
            if !populated.is_empty() {
                return Err(TreelineError::MalformedFragment {
                    row: row.index(),
                    entity: entity.to_string(),
                    columns: populated,
                });
            }
        }

        Ok(Fragment {
            name,
            uid,
            properties,
        })
    }
}

impl Breakdown {
    /// Ingest one interval of one row.
    ///
    /// Returns the UID created or updated, or `None` when the row continues
    /// the instance an earlier row established.
    pub fn ingest(&mut self, interval: &Interval, row: &Row<'_>, policy: UpdatePolicy) -> Result<Option<Uid>> {
        self.ingest_with(interval, row, policy, &NoCleanup)
    }

    /// [`Breakdown::ingest`] with a cleanup hook applied to scalar properties.
    pub fn ingest_with(
        &mut self,
        interval: &Interval,
        row: &Row<'_>,
        policy: UpdatePolicy,
        cleaner: &dyn CellCleaner,
    ) -> Result<Option<Uid>> {
        let fragment = Fragment::read(interval, row)?;
        let entity_type = interval.entity_column();
        self.check_forward_references(interval, row)?;
        self.entity_types.insert(entity_type.to_string());

        let Some(name) = fragment.name else {
            tracing::trace!(row = row.index(), entity = entity_type, "continuation");
            return Ok(None);
        };

        let parent = self.docking_point(interval, row)?;
        self.check_branching(parent.as_ref(), entity_type, row)?;

        let acronym = self
            .allocator
            .acronym_for(entity_type)
            .map_err(|source| TreelineError::Allocation {
                row: row.index(),
                source,
            })?;

        let reused = match fragment.uid.and_then(CellValue::as_text) {
            Some(raw) if policy.reuse_uids() => {
                Some(self.check_reused_uid(&raw, parent.as_ref(), &acronym, entity_type, row, policy)?)
            }
            _ => None,
        };

        let uid = match reused {
            Some(uid) => {
                self.allocator
                    .seed(&uid)
                    .map_err(|source| TreelineError::Allocation {
                        row: row.index(),
                        source,
                    })?;
                uid
            }
            None => self
                .allocator
                .next(parent.as_ref(), &acronym)
                .map_err(|source| TreelineError::Allocation {
                    row: row.index(),
                    source,
                })?,
        };

        let tree = self
            .root
            .tree_under_mut(parent.as_ref(), entity_type)
            .ok_or_else(|| TreelineError::NoParentEntityFound {
                row: row.index(),
                entity: entity_type.to_string(),
                columns: interval.columns().to_vec(),
            })?;

        match tree.get_mut(uid.leaf()) {
            Some(existing) => {
                existing.rename(&name);
                for (column, value) in fragment.properties {
                    existing.merge_property(column, cleaner.clean(column, value.clone()));
                }
                tracing::debug!(row = row.index(), entity = entity_type, uid = %uid, "merged entity");
            }
            None => {
                let mut instance = EntityInstance::new(uid.clone(), &name);
                for (column, value) in fragment.properties {
                    instance.set_property(column, cleaner.clean(column, value.clone()));
                }
                tree.insert(instance);
                tracing::debug!(row = row.index(), entity = entity_type, uid = %uid, "docked entity");
            }
        }

        self.remember(entity_type, parent.as_ref(), &uid);
        Ok(Some(uid))
    }

    /// An interval may not contain a column naming an entity type already met
    /// to its left.
    fn check_forward_references(&self, interval: &Interval, row: &Row<'_>) -> Result<()> {
        let entity_type = interval.entity_column();
        let offending = interval
            .columns()
            .iter()
            .find(|c| c.as_str() != entity_type && self.entity_types.contains(c.as_str()));
        match offending {
            Some(column) => Err(TreelineError::ForwardReference {
                row: row.index(),
                entity: entity_type.to_string(),
                column: column.clone(),
            }),
            None => Ok(()),
        }
    }

    /// UID of the instance a new entity attaches under; `None` for the root.
    ///
    /// The parent is the nearest entity-type column to the left of the
    /// interval, resolved through `last_path`.
    fn docking_point(&self, interval: &Interval, row: &Row<'_>) -> Result<Option<Uid>> {
        let entity_type = interval.entity_column();
        if entity_type == self.root.entity_type() {
            return Ok(None);
        }

        let not_found = || TreelineError::NoParentEntityFound {
            row: row.index(),
            entity: entity_type.to_string(),
            columns: interval.columns().to_vec(),
        };

        let start = interval
            .columns()
            .iter()
            .filter_map(|c| row.position(c))
            .min()
            .ok_or_else(not_found)?;
        let parent_type = row.columns()[..start]
            .iter()
            .rev()
            .filter(|c| !is_uid_column(c))
            .find(|c| c.as_str() != entity_type && self.entity_types.contains(c.as_str()))
            .ok_or_else(not_found)?;

        self.last_path
            .get(parent_type.as_str())
            .cloned()
            .map(Some)
            .ok_or_else(not_found)
    }

    /// A tabular row can only extend a parent along one sub-entity type.
    fn check_branching(&self, parent: Option<&Uid>, entity_type: &str, row: &Row<'_>) -> Result<()> {
        let Some(parent) = parent else {
            return Ok(());
        };
        let Some(instance) = self.root.find(parent) else {
            return Ok(());
        };
        if instance.children().is_empty() || instance.children().contains_key(entity_type) {
            return Ok(());
        }
        let mut types: Vec<String> = instance.children().keys().cloned().collect();
        types.push(entity_type.to_string());
        tracing::warn!(row = row.index(), uid = %parent, "ambiguous branching");
        Err(TreelineError::AmbiguousBranching {
            uid: parent.to_string(),
            types,
        })
    }

    /// A reused UID must sit directly under the docking point, carry the
    /// entity type's acronym, and (without merge) not already be in the tree.
    fn check_reused_uid(
        &self,
        raw: &str,
        parent: Option<&Uid>,
        acronym: &str,
        entity_type: &str,
        row: &Row<'_>,
        policy: UpdatePolicy,
    ) -> Result<Uid> {
        let incompatible = |reason: String| TreelineError::IncompatibleUidReuse {
            row: row.index(),
            uid: raw.to_string(),
            entity: entity_type.to_string(),
            reason,
        };

        let uid: Uid = raw.parse().map_err(|e| incompatible(format!("{}", e)))?;
        if uid.parent().as_ref() != parent {
            return Err(incompatible(match parent {
                Some(p) => format!("expected a child of '{}'", p),
                None => "expected a top-level UID".to_string(),
            }));
        }
        if uid.leaf().acronym() != acronym {
            return Err(incompatible(format!(
                "expected acronym '{}', found '{}'",
                acronym,
                uid.leaf().acronym()
            )));
        }
        if !policy.merge() && self.root.find(&uid).is_some() {
            return Err(incompatible(
                "an entity with this UID already exists and merging is disabled".to_string(),
            ));
        }
        Ok(uid)
    }
}
