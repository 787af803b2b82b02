//! Storage configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where listening positions are kept
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for per-book position files
    ///
    /// Defaults to `positions` under the platform data directory when unset.
    pub positions_dir: Option<PathBuf>,
}

impl ConfigSection for StorageConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = Vec::new();

        // The directory is created on first save, so existence is not checked
        if let Some(ref dir) = self.positions_dir {
            results.push(Validator::non_empty_path(dir, "storage", "positions_dir"));
        }

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        if other.positions_dir.is_some() {
            self.positions_dir = other.positions_dir;
        }
    }

    fn section_name(&self) -> &'static str {
        "storage"
    }
}
