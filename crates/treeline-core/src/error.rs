//! Error types for Treeline core.

use thiserror::Error;

use treeline_engine::EngineError;

/// Errors raised while building, loading or storing entity trees.
///
/// Ingestion failures carry the 0-based row index so the source sheet can be
/// fixed; none of them are retried or recovered.
#[derive(Error, Debug)]
pub enum TreelineError {
    #[error("Row {row}: entity '{entity}' is blank but properties are present in {columns:?}")]
    MalformedFragment {
        row: usize,
        entity: String,
        columns: Vec<String>,
    },

    #[error("Row {row}: interval columns {missing:?} are not present in the row")]
    MissingColumns { row: usize, missing: Vec<String> },

    #[error("Row {row}: entity column '{column}' appears {count} times, expected exactly once")]
    EntityColumnCount {
        row: usize,
        column: String,
        count: usize,
    },

    #[error("Row {row}: interval for '{entity}' contains column '{column}', an entity type seen to its left")]
    ForwardReference {
        row: usize,
        entity: String,
        column: String,
    },

    #[error("Row {row}: no parent entity to dock '{entity}' under (interval {columns:?})")]
    NoParentEntityFound {
        row: usize,
        entity: String,
        columns: Vec<String>,
    },

    #[error("Row {row}: cannot reuse UID '{uid}' for '{entity}': {reason}")]
    IncompatibleUidReuse {
        row: usize,
        uid: String,
        entity: String,
        reason: String,
    },

    #[error("Entity '{uid}' branches into more than one sub-entity type: {types:?}")]
    AmbiguousBranching { uid: String, types: Vec<String> },

    #[error("No entity with UID '{uid}' to dock under")]
    UnknownParent { uid: String },

    #[error("Row {row}: {source}")]
    Allocation {
        row: usize,
        #[source]
        source: EngineError,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Row {row} has {found} cells but the table has {expected} columns")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Invalid manifest at '{path}': {message}")]
    InvalidManifest { path: String, message: String },

    #[error("Prior tree is rooted at '{found}', expected '{expected}'")]
    RootEntityMismatch { expected: String, found: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, TreelineError>;
