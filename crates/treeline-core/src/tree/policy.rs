use serde::{Deserialize, Serialize};

/// How re-ingestion treats identifiers and existing content.
///
/// - `reuse_uids`: trust UIDs carried by incoming rows instead of minting new ones.
/// - `merge`: update an instance already present at the target UID in place
///   instead of requiring a fresh one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdatePolicy {
    reuse_uids: bool,
    merge: bool,
}

impl UpdatePolicy {
    pub fn new(reuse_uids: bool, merge: bool) -> Self {
        UpdatePolicy { reuse_uids, merge }
    }

    /// Fresh UIDs, no merging.
    pub fn replace() -> Self {
        Self::default()
    }

    pub fn reuse_uids(&self) -> bool {
        self.reuse_uids
    }

    pub fn merge(&self) -> bool {
        self.merge
    }

    pub fn with_reuse_uids(self, reuse_uids: bool) -> Self {
        UpdatePolicy { reuse_uids, ..self }
    }

    pub fn with_merge(self, merge: bool) -> Self {
        UpdatePolicy { merge, ..self }
    }
}
