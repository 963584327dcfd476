//! Flattening a tree back into the "blank means inherit" grid.
//!
//! Each depth owns one column group: entity name, its UID column, then the
//! union of property names seen at that depth. A parent's cells are written on
//! the row of its first descendant only, so re-ingesting the table (with
//! `reuse_uids`) rebuilds the same tree.

use indexmap::IndexSet;

use super::breakdown::Breakdown;
use super::instance::EntityInstance;
use super::subtree::BreakdownTree;
use crate::error::{Result, TreelineError};
use crate::table::{CellValue, Table};
use treeline_engine::engine::{UID_COLUMN, is_uid_column};

struct Level {
    entity_type: String,
    uid_column: String,
    properties: IndexSet<String>,
}

impl Level {
    fn new(entity_type: &str, depth: usize) -> Self {
        let uid_column = match depth {
            0 => UID_COLUMN.to_string(),
            d => format!("{}-{}", UID_COLUMN, d),
        };
        Level {
            entity_type: entity_type.to_string(),
            uid_column,
            properties: IndexSet::new(),
        }
    }

    fn width(&self) -> usize {
        2 + self.properties.len()
    }
}

impl Breakdown {
    /// Strictly two-dimensional view of the tree.
    ///
    /// Fails with [`TreelineError::AmbiguousBranching`] when an instance holds
    /// more than one sub-entity type, or when one depth mixes entity types.
    pub fn to_table(&self) -> Result<Table> {
        let mut levels = Vec::new();
        collect_levels(self.root(), 0, &mut levels)?;

        let entity_types: IndexSet<String> = levels.iter().map(|l| l.entity_type.clone()).collect();
        for level in &mut levels {
            level
                .properties
                .retain(|p| !entity_types.contains(p) && !is_uid_column(p));
        }

        let mut columns = Vec::new();
        let mut offsets = Vec::with_capacity(levels.len());
        for level in &levels {
            offsets.push(columns.len());
            columns.push(level.entity_type.clone());
            columns.push(level.uid_column.clone());
            columns.extend(level.properties.iter().cloned());
        }
        debug_assert_eq!(columns.len(), levels.iter().map(Level::width).sum::<usize>());

        let mut table = Table::new(columns);
        let mut flattener = Flattener {
            levels: &levels,
            offsets: &offsets,
            cells: vec![CellValue::Empty; table.columns().len()],
            table: &mut table,
        };
        for instance in self.root().instances() {
            flattener.emit(instance, 0)?;
        }
        tracing::debug!(rows = table.len(), levels = levels.len(), "flattened tree");
        Ok(table)
    }
}

fn collect_levels(tree: &BreakdownTree, depth: usize, levels: &mut Vec<Level>) -> Result<()> {
    if depth == levels.len() {
        levels.push(Level::new(tree.entity_type(), depth));
    } else if levels[depth].entity_type != tree.entity_type() {
        return Err(TreelineError::AmbiguousBranching {
            uid: tree.parent_uid().map(ToString::to_string).unwrap_or_default(),
            types: vec![levels[depth].entity_type.clone(), tree.entity_type().to_string()],
        });
    }

    for instance in tree.instances() {
        levels[depth]
            .properties
            .extend(instance.properties().keys().cloned());
        if instance.children().len() > 1 {
            return Err(TreelineError::AmbiguousBranching {
                uid: instance.uid().to_string(),
                types: instance.children().keys().cloned().collect(),
            });
        }
        for child in instance.children().values().filter(|t| !t.is_empty()) {
            collect_levels(child, depth + 1, levels)?;
        }
    }
    Ok(())
}

struct Flattener<'a> {
    levels: &'a [Level],
    offsets: &'a [usize],
    cells: Vec<CellValue>,
    table: &'a mut Table,
}

impl Flattener<'_> {
    fn emit(&mut self, instance: &EntityInstance, depth: usize) -> Result<()> {
        let level = &self.levels[depth];
        let at = self.offsets[depth];
        self.cells[at] = CellValue::Text(instance.name().to_string());
        self.cells[at + 1] = CellValue::Text(instance.uid().to_string());
        for (i, property) in level.properties.iter().enumerate() {
            self.cells[at + 2 + i] = instance.property(property).cloned().unwrap_or_default();
        }

        match instance.children().values().find(|t| !t.is_empty()) {
            Some(subtree) => {
                for child in subtree.instances() {
                    self.emit(child, depth + 1)?;
                }
            }
            None => {
                let blank = vec![CellValue::Empty; self.cells.len()];
                self.table.push_row(std::mem::replace(&mut self.cells, blank))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::UpdatePolicy;
    use treeline_engine::engine::IntervalSpec;

    fn build(table: &Table, specs: &[IntervalSpec], root: &str, policy: UpdatePolicy) -> Breakdown {
        let intervals: Vec<_> = specs.iter().map(|s| s.resolve(table.columns()).unwrap()).collect();
        let mut tree = Breakdown::new(root);
        for row in table.rows() {
            for interval in &intervals {
                tree.ingest(interval, &row, policy).unwrap();
            }
        }
        tree
    }

    fn source() -> Table {
        Table::from_rows(
            &["A", "color", "B", "height", "C"],
            &[
                &["a1", "red", "b1", "2", "c1"],
                &["", "", "b2", "3", "c2"],
                &["", "", "", "", "c3"],
                &["a2", "blue", "", "", ""],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_flattened_layout() {
        let tree = build(
            &source(),
            &[
                IntervalSpec::closed_open("A", "B"),
                IntervalSpec::closed_open("B", "C"),
                IntervalSpec::greedy("C"),
            ],
            "A",
            UpdatePolicy::replace(),
        );
        let flat = tree.to_table().unwrap();
        assert_eq!(
            flat.columns(),
            &["A", "UID", "color", "B", "UID-1", "height", "C", "UID-2"]
        );
        assert_eq!(flat.len(), 4);

        let row = flat.row(2).unwrap();
        assert!(row.get("A").unwrap().is_blank());
        assert!(row.get("B").unwrap().is_blank());
        assert_eq!(row.get("UID-2"), Some(&CellValue::text("A1.B2.C2")));

        let last = flat.row(3).unwrap();
        assert_eq!(last.get("A"), Some(&CellValue::text("a2")));
        assert!(last.get("C").unwrap().is_blank());
    }

    #[test]
    fn test_reingest_flattened_table() {
        let tree = build(
            &source(),
            &[
                IntervalSpec::closed_open("A", "B"),
                IntervalSpec::closed_open("B", "C"),
                IntervalSpec::greedy("C"),
            ],
            "A",
            UpdatePolicy::replace(),
        );
        let flat = tree.to_table().unwrap();
        let rebuilt = build(
            &flat,
            &[
                IntervalSpec::closed_open("A", "B"),
                IntervalSpec::closed_open("B", "C"),
                IntervalSpec::greedy("C"),
            ],
            "A",
            UpdatePolicy::new(true, false),
        );
        assert_eq!(rebuilt.as_dicts(), tree.as_dicts());
    }

    #[test]
    fn test_multi_branching_rejected() {
        let mut tree = Breakdown::new("A");
        let a1 = tree.dock(None, "A", "a", Vec::new()).unwrap();
        tree.dock(Some(&a1), "B", "b", Vec::new()).unwrap();
        tree.dock(Some(&a1), "Costs", "c", Vec::new()).unwrap();
        match tree.to_table() {
            Err(TreelineError::AmbiguousBranching { uid, types }) => {
                assert_eq!(uid, "A1");
                assert_eq!(types, vec!["B".to_string(), "Costs".to_string()]);
            }
            other => panic!("expected branching error, got {:?}", other),
        }
    }

    #[test]
    fn test_mixed_types_at_one_depth_rejected() {
        let mut tree = Breakdown::new("A");
        let a1 = tree.dock(None, "A", "a", Vec::new()).unwrap();
        let a2 = tree.dock(None, "A", "b", Vec::new()).unwrap();
        tree.dock(Some(&a1), "B", "x", Vec::new()).unwrap();
        tree.dock(Some(&a2), "Costs", "y", Vec::new()).unwrap();
        assert!(matches!(
            tree.to_table(),
            Err(TreelineError::AmbiguousBranching { .. })
        ));
    }
}
