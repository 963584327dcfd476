//! Column intervals.
//!
//! A table's ordered column list (its "linear space") is partitioned into
//! intervals, each owned by one entity type. An [`IntervalSpec`] describes how
//! to carve an interval out of a linear space; resolving it yields a concrete
//! [`Interval`].
//!
//! UID columns (`UID`, `UID-1`, `UID.2`, ...) may be interspersed anywhere and
//! are ignored by membership and contiguity checks.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::error::{EngineError, Result};

/// Canonical header of the column carrying an entity's UID.
pub const UID_COLUMN: &str = "UID";

/// True for `UID` and its de-duplicated forms `UID-<n>` / `UID.<n>`.
pub fn is_uid_column(name: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^UID(?:[-.][0-9]+)?$").expect("UID column regex must compile"))
        .is_match(name)
}

/// Ordered columns owned by one entity type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interval {
    columns: Vec<String>,
    entity_column: String,
}

impl Interval {
    /// Build an interval. The entity column defaults to the first non-UID column
    /// and must appear exactly once. At most one UID column is allowed.
    pub fn new(columns: Vec<String>, entity_column: Option<&str>) -> Result<Interval> {
        let entity_column = match entity_column {
            Some(name) => name.to_string(),
            None => columns
                .iter()
                .find(|c| !is_uid_column(c))
                .cloned()
                .ok_or(EngineError::EmptyInterval)?,
        };
        let occurrences = columns.iter().filter(|c| **c == entity_column).count();
        if occurrences != 1 || is_uid_column(&entity_column) {
            return Err(EngineError::EntityColumn {
                column: entity_column,
                columns,
            });
        }
        if columns.iter().filter(|c| is_uid_column(c)).count() > 1 {
            return Err(EngineError::MultipleUidColumns { columns });
        }
        Ok(Interval {
            columns,
            entity_column,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The column holding the entity's name; also the entity type's name.
    pub fn entity_column(&self) -> &str {
        &self.entity_column
    }

    /// The interval's UID column, if it has one.
    pub fn uid_column(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| is_uid_column(c))
            .map(String::as_str)
    }

    /// Columns that must be present in every row: everything except UID columns.
    pub fn data_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .map(String::as_str)
            .filter(|c| !is_uid_column(c))
    }

    /// Scalar property columns: everything except the entity and UID columns.
    pub fn property_columns(&self) -> impl Iterator<Item = &str> {
        self.data_columns().filter(move |c| *c != self.entity_column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// Strategy for carving an [`Interval`] out of a linear space of columns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntervalSpec {
    /// `start` (inclusive) up to `following` (exclusive).
    ClosedOpen {
        start: String,
        following: String,
        #[serde(default)]
        entity_column: Option<String>,
    },
    /// An explicit column list; every column must exist in the table.
    Fixed {
        columns: Vec<String>,
        #[serde(default)]
        entity_column: Option<String>,
    },
    /// An explicit column list, reduced to the columns the table actually has.
    Minimalist {
        columns: Vec<String>,
        #[serde(default)]
        entity_column: Option<String>,
    },
    /// `start` through the end of the table, or up to the next claimed column.
    Greedy {
        start: String,
        #[serde(default)]
        entity_column: Option<String>,
    },
}

impl IntervalSpec {
    pub fn closed_open(start: &str, following: &str) -> Self {
        IntervalSpec::ClosedOpen {
            start: start.to_string(),
            following: following.to_string(),
            entity_column: None,
        }
    }

    pub fn fixed(columns: &[&str]) -> Self {
        IntervalSpec::Fixed {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            entity_column: None,
        }
    }

    pub fn minimalist(columns: &[&str]) -> Self {
        IntervalSpec::Minimalist {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            entity_column: None,
        }
    }

    pub fn greedy(start: &str) -> Self {
        IntervalSpec::Greedy {
            start: start.to_string(),
            entity_column: None,
        }
    }

    /// Override the entity-name column (defaults to the first column).
    pub fn with_entity_column(mut self, column: &str) -> Self {
        match &mut self {
            IntervalSpec::ClosedOpen { entity_column, .. }
            | IntervalSpec::Fixed { entity_column, .. }
            | IntervalSpec::Minimalist { entity_column, .. }
            | IntervalSpec::Greedy { entity_column, .. } => {
                *entity_column = Some(column.to_string());
            }
        }
        self
    }

    pub fn is_greedy(&self) -> bool {
        matches!(self, IntervalSpec::Greedy { .. })
    }

    /// Resolve against the full ordered column list of a table.
    pub fn resolve(&self, columns: &[String]) -> Result<Interval> {
        self.resolve_claimed(columns, &HashSet::new())
    }

    /// Resolve, treating `claimed` positions as owned by other intervals.
    ///
    /// Only greedy specs consult `claimed`: they stop at the first claimed
    /// position after their start.
    pub fn resolve_claimed(&self, columns: &[String], claimed: &HashSet<usize>) -> Result<Interval> {
        match self {
            IntervalSpec::ClosedOpen {
                start,
                following,
                entity_column,
            } => {
                let start_pos = position(columns, start)?;
                let following_pos = position(columns, following)?;
                if start_pos >= following_pos {
                    return Err(EngineError::BoundaryOrder {
                        start: start.clone(),
                        following: following.clone(),
                    });
                }
                Interval::new(
                    columns[start_pos..following_pos].to_vec(),
                    entity_column.as_deref(),
                )
            }
            IntervalSpec::Fixed {
                columns: wanted,
                entity_column,
            } => {
                let interval = Interval::new(wanted.clone(), entity_column.as_deref())?;
                if interval.data_columns().all(|c| columns.iter().any(|x| x == c)) {
                    check_contiguous(&interval, columns)?;
                }
                Ok(interval)
            }
            IntervalSpec::Minimalist {
                columns: wanted,
                entity_column,
            } => {
                let present: Vec<String> = wanted
                    .iter()
                    .filter(|c| columns.contains(c))
                    .cloned()
                    .collect();
                let interval = Interval::new(present, entity_column.as_deref())?;
                check_contiguous(&interval, columns)?;
                Ok(interval)
            }
            IntervalSpec::Greedy {
                start,
                entity_column,
            } => {
                let start_pos = position(columns, start)?;
                let end = (start_pos + 1..columns.len())
                    .find(|p| claimed.contains(p))
                    .unwrap_or(columns.len());
                Interval::new(columns[start_pos..end].to_vec(), entity_column.as_deref())
            }
        }
    }
}

fn position(columns: &[String], name: &str) -> Result<usize> {
    columns
        .iter()
        .position(|c| c == name)
        .ok_or_else(|| EngineError::MissingColumn {
            column: name.to_string(),
            columns: columns.to_vec(),
        })
}

/// The interval's data columns must form one unbroken run of the linear
/// space, UID columns aside.
fn check_contiguous(interval: &Interval, columns: &[String]) -> Result<()> {
    let positions: Vec<usize> = interval
        .data_columns()
        .filter_map(|c| columns.iter().position(|x| x == c))
        .collect();
    let (Some(&lo), Some(&hi)) = (positions.iter().min(), positions.iter().max()) else {
        return Ok(());
    };
    let gap = columns[lo..=hi]
        .iter()
        .any(|c| !is_uid_column(c) && !interval.contains(c));
    if gap {
        return Err(EngineError::NonContiguous {
            columns: interval.columns().to_vec(),
        });
    }
    Ok(())
}
