//! Row/column grid handed over by the spreadsheet reader.
//!
//! - [`CellValue`] - Empty, numeric or text contents of one cell
//! - [`Table`] - Ordered column headers (the linear space) plus rows of cells
//! - [`Row`] - Borrowed view of one row, addressed by column name

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, TreelineError};
use treeline_engine::engine::clean_header;

/// Contents of a single cell.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    /// Parse user-style input: blank -> Empty, numeric -> Number, else Text.
    pub fn from_input(input: &str) -> CellValue {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => CellValue::Number(n),
            _ => CellValue::Text(input.to_string()),
        }
    }

    /// Blank cells are empty, whitespace-only text or NaN.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Number(n) => n.is_nan(),
            CellValue::Text(s) => s.trim().is_empty(),
        }
    }

    /// Trimmed display text, `None` when blank.
    pub fn as_text(&self) -> Option<String> {
        if self.is_blank() {
            return None;
        }
        Some(self.to_string().trim().to_string())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => f.write_str(&format_number(*n)),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// Format a number the way a spreadsheet shows it: integers without decimals.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        String::new()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

/// A range-selected, header-cleaned grid with one row per logical record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Create an empty table with the given headers, used as-is.
    pub fn new(columns: Vec<String>) -> Table {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    /// Create an empty table, stripping `(...)` comments from raw headers.
    pub fn with_raw_headers<S: AsRef<str>>(raw: &[S]) -> Table {
        Table::new(raw.iter().map(|h| clean_header(h.as_ref())).collect())
    }

    /// Convenience constructor from string cells; `""` becomes [`CellValue::Empty`].
    pub fn from_rows(columns: &[&str], rows: &[&[&str]]) -> Result<Table> {
        let mut table = Table::new(columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            table.push_row(row.iter().map(|c| CellValue::from_input(c)).collect())?;
        }
        Ok(table)
    }

    /// Append a row. Short rows are padded with empty cells.
    pub fn push_row(&mut self, mut cells: Vec<CellValue>) -> Result<()> {
        if cells.len() > self.columns.len() {
            return Err(TreelineError::RaggedRow {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: cells.len(),
            });
        }
        cells.resize(self.columns.len(), CellValue::Empty);
        self.rows.push(cells);
        Ok(())
    }

    /// The linear space: every column in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|cells| Row {
            index,
            columns: &self.columns,
            cells,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().enumerate().map(|(index, cells)| Row {
            index,
            columns: &self.columns,
            cells,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One row of a [`Table`].
#[derive(Clone, Copy, Debug)]
pub struct Row<'a> {
    index: usize,
    columns: &'a [String],
    cells: &'a [CellValue],
}

impl<'a> Row<'a> {
    /// Build a row view over caller-owned data.
    pub fn new(index: usize, columns: &'a [String], cells: &'a [CellValue]) -> Row<'a> {
        Row {
            index,
            columns,
            cells,
        }
    }

    /// 0-based position of the row in its table.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn columns(&self) -> &'a [String] {
        self.columns
    }

    /// Every cell, in column order.
    pub fn cells(&self) -> &'a [CellValue] {
        self.cells
    }

    /// First cell under `column`.
    pub fn get(&self, column: &str) -> Option<&'a CellValue> {
        self.position(column).and_then(|p| self.cells.get(p))
    }

    /// First position of `column` in the row.
    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// How many times `column` appears in the row's headers.
    pub fn occurrences(&self, column: &str) -> usize {
        self.columns.iter().filter(|c| *c == column).count()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.position(column).is_some()
    }
}
