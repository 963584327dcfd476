//! Entity tree model.
//!
//! - [`Breakdown`] - The global tree: root, shared allocator, continuation state
//! - [`BreakdownTree`] - Instances of one entity type under one parent
//! - [`EntityInstance`] - One occurrence with its properties and sub-trees
//! - [`UpdatePolicy`] - UID reuse and merge switches read by ingestion

mod breakdown;
mod clean;
mod ingest;
mod instance;
mod manifest;
mod policy;
mod subtree;
mod tabular;

pub use breakdown::Breakdown;
pub use clean::{BlankDefaults, CellCleaner, NoCleanup};
pub use instance::EntityInstance;
pub use manifest::{ManifestMap, ManifestValue};
pub use policy::UpdatePolicy;
pub use subtree::BreakdownTree;
