//! Posting configuration: which entity roots the tree, how the columns split
//! into intervals, and the update policy.
//!
//! ```toml
//! root_entity = "Big Rock"
//!
//! [policy]
//! reuse_uids = true
//!
//! [[intervals]]
//! kind = "closed_open"
//! start = "Big Rock"
//! following = "Sub Rock"
//!
//! [[intervals]]
//! kind = "greedy"
//! start = "Sub Rock"
//!
//! [defaults]
//! Effort = 0
//! ```

use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

use crate::error::{Result, TreelineError};
use crate::orchestrator::TreeOrchestrator;
use crate::table::CellValue;
use crate::tree::{BlankDefaults, UpdatePolicy};
use treeline_engine::engine::IntervalSpec;

const MAX_CONFIG_FILE_BYTES: u64 = 1_048_576; // 1 MiB
const MAX_INTERVALS: usize = 256;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostingConfig {
    pub root_entity: String,
    #[serde(default)]
    pub policy: UpdatePolicy,
    pub intervals: Vec<IntervalSpec>,
    /// Per-column replacement for blank cells.
    #[serde(default)]
    pub defaults: IndexMap<String, CellValue>,
}

impl PostingConfig {
    pub fn from_toml_str(content: &str) -> Result<PostingConfig> {
        let config: PostingConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<PostingConfig> {
        let meta = std::fs::metadata(path)?;
        if meta.len() > MAX_CONFIG_FILE_BYTES {
            return Err(TreelineError::Config(format!(
                "Refusing to read {}: file too large ({} bytes, max {})",
                path.display(),
                meta.len(),
                MAX_CONFIG_FILE_BYTES
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), intervals = config.intervals.len(), "loaded posting config");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.root_entity.trim().is_empty() {
            return Err(TreelineError::Config("root_entity must not be blank".to_string()));
        }
        if self.intervals.is_empty() {
            return Err(TreelineError::Config("at least one interval is required".to_string()));
        }
        if self.intervals.len() > MAX_INTERVALS {
            return Err(TreelineError::Config(format!(
                "Too many intervals ({}, max {})",
                self.intervals.len(),
                MAX_INTERVALS
            )));
        }
        Ok(())
    }

    pub fn cleaner(&self) -> BlankDefaults {
        BlankDefaults::new(self.defaults.clone())
    }

    pub fn orchestrator(&self) -> TreeOrchestrator {
        let orchestrator = TreeOrchestrator::new(&self.root_entity, self.intervals.clone(), self.policy);
        let cleaner = self.cleaner();
        if cleaner.is_empty() {
            orchestrator
        } else {
            orchestrator.with_cleaner(cleaner)
        }
    }
}
