//! Outer ingestion loop: every row, every interval, in order.

use std::collections::HashSet;
use std::fmt;

use crate::error::{Result, TreelineError};
use crate::table::Table;
use crate::tree::{Breakdown, CellCleaner, ManifestMap, NoCleanup, UpdatePolicy};
use treeline_engine::engine::{Interval, IntervalSpec, Uid};

/// Builds one [`Breakdown`] per table from an ordered list of interval specs.
///
/// Specs are listed outermost entity first; that order is also the order in
/// which each row's intervals are ingested.
pub struct TreeOrchestrator {
    root_entity: String,
    specs: Vec<IntervalSpec>,
    policy: UpdatePolicy,
    cleaner: Box<dyn CellCleaner>,
}

impl fmt::Debug for TreeOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeOrchestrator")
            .field("root_entity", &self.root_entity)
            .field("specs", &self.specs)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// A finished build: the tree plus the last UID each row touched.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeBuild {
    tree: Breakdown,
    row_uids: Vec<Option<Uid>>,
}

impl TreeBuild {
    pub fn tree(&self) -> &Breakdown {
        &self.tree
    }

    pub fn into_tree(self) -> Breakdown {
        self.tree
    }

    /// Indexed by row; `None` for rows that only continued earlier entities.
    pub fn row_uids(&self) -> &[Option<Uid>] {
        &self.row_uids
    }

    pub fn as_dicts(&self) -> ManifestMap {
        self.tree.as_dicts()
    }
}

impl TreeOrchestrator {
    pub fn new(root_entity: &str, specs: Vec<IntervalSpec>, policy: UpdatePolicy) -> Self {
        TreeOrchestrator {
            root_entity: root_entity.to_string(),
            specs,
            policy,
            cleaner: Box::new(NoCleanup),
        }
    }

    pub fn with_cleaner(mut self, cleaner: impl CellCleaner + 'static) -> Self {
        self.cleaner = Box::new(cleaner);
        self
    }

    pub fn root_entity(&self) -> &str {
        &self.root_entity
    }

    pub fn policy(&self) -> UpdatePolicy {
        self.policy
    }

    /// Resolve every spec against `columns`.
    ///
    /// Non-greedy specs resolve first; greedy ones then stop at the first
    /// column another interval already claimed. The result keeps the declared
    /// order.
    pub fn resolve_intervals(&self, columns: &[String]) -> Result<Vec<Interval>> {
        let mut claimed = HashSet::new();
        let mut resolved: Vec<Option<Interval>> = vec![None; self.specs.len()];

        let greedy_last = self
            .specs
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_greedy())
            .chain(self.specs.iter().enumerate().filter(|(_, s)| s.is_greedy()));
        for (i, spec) in greedy_last {
            let interval = spec.resolve_claimed(columns, &claimed)?;
            claimed.extend(
                interval
                    .columns()
                    .iter()
                    .filter_map(|c| columns.iter().position(|x| x == c)),
            );
            resolved[i] = Some(interval);
        }
        Ok(resolved.into_iter().flatten().collect())
    }

    pub fn build(&self, table: &Table) -> Result<TreeBuild> {
        self.build_with_prior(table, None)
    }

    /// Build against an earlier tree according to the update policy.
    ///
    /// | merge | reuse_uids | result                                          |
    /// |-------|------------|-------------------------------------------------|
    /// | true  | any        | rows ingested into the prior tree               |
    /// | false | true       | fresh tree, allocator seeded from the prior     |
    /// | false | false      | fresh tree, fresh allocator                     |
    pub fn build_with_prior(&self, table: &Table, prior: Option<Breakdown>) -> Result<TreeBuild> {
        if let Some(prior) = &prior
            && prior.root_entity() != self.root_entity
        {
            return Err(TreelineError::RootEntityMismatch {
                expected: self.root_entity.clone(),
                found: prior.root_entity().to_string(),
            });
        }

        let mut tree = match prior {
            Some(mut prior) if self.policy.merge() => {
                prior.clear_continuation();
                prior
            }
            Some(prior) if self.policy.reuse_uids() => {
                Breakdown::with_allocator(&self.root_entity, prior.into_allocator())
            }
            _ => Breakdown::new(&self.root_entity),
        };

        let intervals = self.resolve_intervals(table.columns())?;
        let mut row_uids = Vec::with_capacity(table.len());
        for row in table.rows() {
            let mut touched = None;
            for interval in &intervals {
                if let Some(uid) = tree.ingest_with(interval, &row, self.policy, self.cleaner.as_ref())? {
                    touched = Some(uid);
                }
            }
            row_uids.push(touched);
        }

        tracing::info!(
            root = %self.root_entity,
            rows = table.len(),
            intervals = intervals.len(),
            entities = tree.len(),
            "built tree"
        );
        Ok(TreeBuild { tree, row_uids })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::CellValue;
    use crate::tree::{BlankDefaults, ManifestValue};

    fn scenario_table() -> Table {
        Table::from_rows(
            &["A", "color", "size", "B", "height", "coolness", "C"],
            &[
                &["a1", "red", "big", "b1", "2", "low", "c1"],
                &["", "", "", "b2", "3", "high", "c2"],
                &["", "", "", "", "", "", ""],
                &["a2", "blue", "small", "b3", "4", "mid", "c4"],
            ],
        )
        .unwrap()
    }

    fn scenario_specs() -> Vec<IntervalSpec> {
        vec![
            IntervalSpec::closed_open("A", "B"),
            IntervalSpec::closed_open("B", "C"),
            IntervalSpec::greedy("C"),
        ]
    }

    fn uid(s: &str) -> Uid {
        s.parse().unwrap()
    }

    #[test]
    fn test_scenario_tree_shape() {
        let build = TreeOrchestrator::new("A", scenario_specs(), UpdatePolicy::replace())
            .build(&scenario_table())
            .unwrap();
        let tree = build.tree();

        let top: Vec<String> = tree.root().instances().map(|i| i.uid().to_string()).collect();
        assert_eq!(top, vec!["A1", "A2"]);

        let a1_bs = tree.find(&uid("A1")).unwrap().child_tree("B").unwrap();
        let b_uids: Vec<String> = a1_bs.instances().map(|i| i.uid().to_string()).collect();
        assert_eq!(b_uids, vec!["A1.B1", "A1.B2"]);
        for b in a1_bs.instances() {
            assert_eq!(b.child_tree("C").unwrap().len(), 1);
        }

        let a2 = tree.find(&uid("A2")).unwrap();
        assert_eq!(a2.child_tree("B").unwrap().len(), 1);
        assert_eq!(tree.find(&uid("A2.B1.C1")).unwrap().name(), "c4");
    }

    #[test]
    fn test_every_uid_resolves_to_its_source_name() {
        let table = scenario_table();
        let build = TreeOrchestrator::new("A", scenario_specs(), UpdatePolicy::replace())
            .build(&table)
            .unwrap();
        let tree = build.tree();

        let expected = [
            ("A1", "a1"),
            ("A1.B1", "b1"),
            ("A1.B1.C1", "c1"),
            ("A1.B2", "b2"),
            ("A1.B2.C1", "c2"),
            ("A2", "a2"),
            ("A2.B1", "b3"),
            ("A2.B1.C1", "c4"),
        ];
        let uids: Vec<String> = tree.uids().iter().map(ToString::to_string).collect();
        assert_eq!(uids, expected.iter().map(|(u, _)| u.to_string()).collect::<Vec<_>>());
        for (u, name) in expected {
            assert_eq!(tree.find(&uid(u)).unwrap().name(), name);
        }

        // Each row's UID chain names the entity cells that row populated.
        let entity_columns = ["A", "B", "C"];
        for (index, deepest) in build.row_uids().iter().enumerate() {
            let row = table.row(index).unwrap();
            let mut current = deepest.clone();
            while let Some(u) = current {
                let cell = row.get(entity_columns[u.depth() - 1]).unwrap();
                if *cell != CellValue::Empty {
                    assert_eq!(tree.find(&u).unwrap().name(), cell.to_string());
                }
                current = u.parent();
            }
        }

        // Every level names each entry twice: inside it and as `<leaf>-name` beside it.
        fn check_level(dicts: &ManifestMap, tree: &Breakdown, seen: &mut usize) {
            for (key, value) in dicts {
                let Some(entry) = value.as_map() else { continue };
                let uid: Uid = entry["UID"].as_scalar().unwrap().to_string().parse().unwrap();
                assert_eq!(uid.leaf().to_string(), *key);
                let name = tree.find(&uid).unwrap().name();
                assert_eq!(entry["name"].as_scalar(), Some(&CellValue::text(name)));
                assert_eq!(
                    dicts[&format!("{}-name", key)].as_scalar(),
                    Some(&CellValue::text(name))
                );
                *seen += 1;
                for child in entry.values().filter_map(ManifestValue::as_map) {
                    check_level(child, tree, seen);
                }
            }
        }
        let mut seen = 0;
        check_level(&build.as_dicts(), tree, &mut seen);
        assert_eq!(seen, tree.len());
    }

    #[test]
    fn test_row_uids_track_deepest_touch() {
        let build = TreeOrchestrator::new("A", scenario_specs(), UpdatePolicy::replace())
            .build(&scenario_table())
            .unwrap();
        let rows: Vec<Option<String>> = build
            .row_uids()
            .iter()
            .map(|u| u.as_ref().map(ToString::to_string))
            .collect();
        assert_eq!(
            rows,
            vec![
                Some("A1.B1.C1".to_string()),
                Some("A1.B2.C1".to_string()),
                None,
                Some("A2.B1.C1".to_string()),
            ]
        );
    }

    #[test]
    fn test_dock_costs_after_build() {
        let mut tree = TreeOrchestrator::new("A", scenario_specs(), UpdatePolicy::replace())
            .build(&scenario_table())
            .unwrap()
            .into_tree();
        let parent = uid("A2.B1");
        let costs = tree
            .dock(
                Some(&parent),
                "Costs",
                "ferry",
                vec![("Purpose".to_string(), CellValue::text("transport"))],
            )
            .unwrap();
        assert_eq!(costs.to_string(), "A2.B1.CO1");
        let b = tree.find(&parent).unwrap();
        assert_eq!(b.child_tree("Costs").unwrap().len(), 1);
    }

    #[test]
    fn test_continuation_docks_under_one_outer_instance() {
        let mut rows: Vec<Vec<&str>> = vec![vec!["outer", "x0"]];
        let names = ["x1", "x2", "x3", "x4"];
        for name in names {
            rows.push(vec!["", name]);
        }
        let row_refs: Vec<&[&str]> = rows.iter().map(Vec::as_slice).collect();
        let table = Table::from_rows(&["Outer", "Inner"], &row_refs).unwrap();
        let build = TreeOrchestrator::new(
            "Outer",
            vec![IntervalSpec::closed_open("Outer", "Inner"), IntervalSpec::greedy("Inner")],
            UpdatePolicy::replace(),
        )
        .build(&table)
        .unwrap();
        let root = build.tree().root();
        assert_eq!(root.len(), 1);
        let inner = root.instances().next().unwrap().child_tree("Inner").unwrap();
        assert_eq!(inner.len(), 5);
    }

    #[test]
    fn test_greedy_stops_at_claimed_column() {
        let columns: Vec<String> = ["A", "x", "B", "y", "C", "z"].iter().map(|s| s.to_string()).collect();
        let orchestrator = TreeOrchestrator::new(
            "A",
            vec![
                IntervalSpec::greedy("A"),
                IntervalSpec::closed_open("B", "C"),
                IntervalSpec::greedy("C"),
            ],
            UpdatePolicy::replace(),
        );
        let intervals = orchestrator.resolve_intervals(&columns).unwrap();
        let cols: Vec<&[String]> = intervals.iter().map(Interval::columns).collect();
        assert_eq!(cols[0], &["A", "x"]);
        assert_eq!(cols[1], &["B", "y"]);
        assert_eq!(cols[2], &["C", "z"]);
    }

    #[test]
    fn test_cleaner_applies_defaults() {
        let table = Table::from_rows(&["Task", "Effort"], &[&["write", ""], &["test", "3"]]).unwrap();
        let build = TreeOrchestrator::new("Task", vec![IntervalSpec::greedy("Task")], UpdatePolicy::replace())
            .with_cleaner(BlankDefaults::default().with("Effort", CellValue::Number(0.0)))
            .build(&table)
            .unwrap();
        let tree = build.tree();
        assert_eq!(tree.find(&uid("T1")).unwrap().property("Effort"), Some(&CellValue::Number(0.0)));
        assert_eq!(tree.find(&uid("T2")).unwrap().property("Effort"), Some(&CellValue::Number(3.0)));
    }

    #[test]
    fn test_merge_updates_prior_in_place() {
        let specs = scenario_specs();
        let prior = TreeOrchestrator::new("A", specs.clone(), UpdatePolicy::replace())
            .build(&scenario_table())
            .unwrap()
            .into_tree();

        let update = Table::from_rows(
            &["A", "UID", "color", "size", "B", "height", "coolness", "C"],
            &[&["a1 renamed", "A1", "green", "", "", "", "", ""]],
        )
        .unwrap();
        let merged = TreeOrchestrator::new("A", specs, UpdatePolicy::new(true, true))
            .build_with_prior(&update, Some(prior))
            .unwrap();
        let a1 = merged.tree().find(&uid("A1")).unwrap();
        assert_eq!(a1.name(), "a1 renamed");
        assert_eq!(a1.property("color"), Some(&CellValue::text("green")));
        assert_eq!(a1.property("size"), Some(&CellValue::text("big")));
        assert_eq!(a1.child_tree("B").unwrap().len(), 2);
    }

    #[test]
    fn test_reuse_without_merge_never_reissues_prior_uids() {
        let specs = vec![IntervalSpec::greedy("A")];
        let prior_table = Table::from_rows(&["A"], &[&["a1"], &["a2"], &["a3"]]).unwrap();
        let prior = TreeOrchestrator::new("A", specs.clone(), UpdatePolicy::replace())
            .build(&prior_table)
            .unwrap()
            .into_tree();

        let next = Table::from_rows(&["A", "UID"], &[&["kept", "A2"], &["new", ""]]).unwrap();
        let build = TreeOrchestrator::new("A", specs, UpdatePolicy::new(true, false))
            .build_with_prior(&next, Some(prior))
            .unwrap();
        let uids: Vec<String> = build.tree().uids().iter().map(ToString::to_string).collect();
        assert_eq!(uids, vec!["A2", "A4"]);
    }

    #[test]
    fn test_replace_ignores_prior() {
        let specs = vec![IntervalSpec::greedy("A")];
        let table = Table::from_rows(&["A"], &[&["a1"], &["a2"]]).unwrap();
        let orchestrator = TreeOrchestrator::new("A", specs, UpdatePolicy::replace());
        let prior = orchestrator.build(&table).unwrap().into_tree();
        let again = orchestrator.build_with_prior(&table, Some(prior)).unwrap();
        let uids: Vec<String> = again.tree().uids().iter().map(ToString::to_string).collect();
        assert_eq!(uids, vec!["A1", "A2"]);
    }

    #[test]
    fn test_prior_root_must_match() {
        let prior = Breakdown::new("Other");
        let err = TreeOrchestrator::new("A", vec![IntervalSpec::greedy("A")], UpdatePolicy::replace())
            .build_with_prior(&Table::new(vec!["A".into()]), Some(prior))
            .unwrap_err();
        assert!(matches!(err, TreelineError::RootEntityMismatch { .. }));
    }
}
