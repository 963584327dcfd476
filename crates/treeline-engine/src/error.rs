//! Error types for the Treeline engine.

use thiserror::Error;

/// Integrity failures raised by UID allocation and interval resolution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Acronym '{acronym}' must be non-empty and contain only ASCII letters")]
    UnknownAcronymSyntax { acronym: String },

    #[error("Parent path '{path}' references '{token}', which was never allocated at that level")]
    DanglingParentPath { path: String, token: String },

    #[error("UID depth {depth} exceeds the limit of {limit} levels")]
    StructuralLimit { depth: usize, limit: usize },

    #[error("Invalid UID '{text}': {reason}")]
    InvalidUid { text: String, reason: String },

    #[error("Acronym '{acronym}' for '{entity}' conflicts with existing assignment to '{existing}'")]
    AcronymConflict {
        entity: String,
        acronym: String,
        existing: String,
    },

    #[error("Column '{column}' is not present among {columns:?}")]
    MissingColumn { column: String, columns: Vec<String> },

    #[error("Interval start '{start}' must come strictly before '{following}'")]
    BoundaryOrder { start: String, following: String },

    #[error("Entity column '{column}' must appear exactly once in interval {columns:?}")]
    EntityColumn { column: String, columns: Vec<String> },

    #[error("Interval {columns:?} holds more than one UID column")]
    MultipleUidColumns { columns: Vec<String> },

    #[error("Interval columns {columns:?} are not contiguous in the table")]
    NonContiguous { columns: Vec<String> },

    #[error("Interval has no entity columns")]
    EmptyInterval,
}

pub type Result<T> = std::result::Result<T, EngineError>;
