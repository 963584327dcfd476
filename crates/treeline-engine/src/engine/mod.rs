//! Treeline engine API.
//!
//! Pure building blocks used by the row ingestion algorithm:
//!
//! - [`Uid`], [`UidToken`] - Hierarchical identifiers (`BR2.MR3.SM1`)
//! - [`UidAllocator`] - Per-level counters that mint and seed UIDs, plus the
//!   entity-type to acronym table shared by a whole tree
//! - [`derive_acronym`] - Deterministic acronym derivation with collision widening
//! - [`clean_header`] - Header cleanup applied before intervals are resolved
//! - [`Interval`], [`IntervalSpec`] - Column intervals owned by one entity type

mod acronym;
mod allocator;
mod header;
mod interval;
mod uid;

pub use acronym::{AcronymTable, derive_acronym};
pub use allocator::{MAX_UID_DEPTH, UidAllocator};
pub use header::{clean_header, strip_parentheticals};
pub use interval::{Interval, IntervalSpec, UID_COLUMN, is_uid_column};
pub use uid::{Uid, UidToken};
