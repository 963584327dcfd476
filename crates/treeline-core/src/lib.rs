//! treeline-core - Entity tree model, row ingestion and storage.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod storage;
pub mod table;
pub mod tree;

pub use config::PostingConfig;
pub use error::{Result, TreelineError};
pub use orchestrator::{TreeBuild, TreeOrchestrator};
pub use table::{CellValue, Row, Table};
pub use tree::{
    BlankDefaults, Breakdown, BreakdownTree, CellCleaner, EntityInstance, ManifestMap,
    ManifestValue, NoCleanup, UpdatePolicy,
};

pub use treeline_engine::engine::{Interval, IntervalSpec, Uid, UidAllocator, UidToken};
