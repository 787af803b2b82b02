//! Earmark configuration
//!
//! Settings live in a single TOML file with one table per section. Each
//! section implements [`ConfigSection`] so it can validate and merge itself.
//!
//! - Missing files load as defaults
//! - Invalid values load with a warning but are refused on save
//! - Writes are atomic and keep a `.backup` of the previous file
//!
//! # Example
//!
//! ```rust,no_run
//! use earmark_config::{Config, ConfigManager};
//!
//! let manager = ConfigManager::new().expect("Failed to initialize config");
//! let config = manager.load_or_default();
//!
//! println!("Jump back: {} ms", config.player.jump_back_ms);
//! ```

mod error;
mod manager;
mod persistence;
mod validation;

// Config sections
mod player_config;
mod storage_config;

pub use error::{ConfigError, ConfigResult, Problem, ValidationError};
pub use manager::ConfigManager;
pub use validation::{ConfigSection, Validator};

pub use player_config::PlayerConfig;
pub use storage_config::StorageConfig;

use serde::{Deserialize, Serialize};

/// Current config file format version
pub const CONFIG_VERSION: u32 = 1;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Config file format version
    pub version: u32,

    /// Playback behaviour
    pub player: PlayerConfig,

    /// Where book positions are kept
    pub storage: StorageConfig,
}

impl Config {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the entire configuration
    ///
    /// Returns all validation errors found across all sections.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(mut e) = self.player.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.storage.validate() {
            errors.append(&mut e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Merges this config with another, preferring values from `other`
    pub fn merge(&mut self, other: Config) {
        self.player.merge(other.player);
        self.storage.merge(other.storage);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            player: PlayerConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}
