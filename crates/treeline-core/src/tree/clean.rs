use indexmap::IndexMap;

use crate::table::CellValue;

/// Hook applied to every scalar property before it is stored.
pub trait CellCleaner {
    fn clean(&self, column: &str, value: CellValue) -> CellValue;
}

impl<F> CellCleaner for F
where
    F: Fn(&str, CellValue) -> CellValue,
{
    fn clean(&self, column: &str, value: CellValue) -> CellValue {
        self(column, value)
    }
}

/// Stores values unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCleanup;

impl CellCleaner for NoCleanup {
    fn clean(&self, _column: &str, value: CellValue) -> CellValue {
        value
    }
}

/// Replaces blank cells with a per-column default, e.g. `Effort` blank -> 0.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlankDefaults {
    defaults: IndexMap<String, CellValue>,
}

impl BlankDefaults {
    pub fn new(defaults: IndexMap<String, CellValue>) -> Self {
        BlankDefaults { defaults }
    }

    pub fn with(mut self, column: &str, value: CellValue) -> Self {
        self.defaults.insert(column.to_string(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.defaults.is_empty()
    }
}

impl CellCleaner for BlankDefaults {
    fn clean(&self, column: &str, value: CellValue) -> CellValue {
        match self.defaults.get(column) {
            Some(default) if value.is_blank() => default.clone(),
            _ => value,
        }
    }
}
