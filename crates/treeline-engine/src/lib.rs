//! treeline_engine - Identifier allocation, acronyms and column intervals.

pub mod engine;
pub mod error;

pub use error::{EngineError, Result};
