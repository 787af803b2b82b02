//! Configuration manager - main API for config operations

use crate::error::describe;
use crate::persistence::ConfigPersistence;
use crate::{Config, ConfigError, ConfigResult, ValidationError};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.toml";
const POSITIONS_DIR: &str = "positions";

/// Main configuration manager
///
/// Resolves where the config file and listening positions live, and loads,
/// saves and validates the config.
pub struct ConfigManager {
    persistence: ConfigPersistence,
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl ConfigManager {
    /// Creates a config manager using the platform directories
    ///
    /// - Linux: `~/.config/earmark/` and `~/.local/share/earmark/`
    /// - macOS: `~/Library/Application Support/earmark/`
    /// - Windows: `%APPDATA%\earmark\`
    pub fn new() -> ConfigResult<Self> {
        let dirs = ProjectDirs::from("", "", "earmark").ok_or_else(|| {
            ConfigError::PathResolutionError {
                reason: "Could not determine user config directory".to_string(),
            }
        })?;

        Ok(Self::with_directories(
            dirs.config_dir().to_path_buf(),
            dirs.data_dir().to_path_buf(),
        ))
    }

    /// Creates a config manager rooted at a custom directory
    ///
    /// Data files are kept in the same directory.
    pub fn with_directory(config_dir: PathBuf) -> ConfigResult<Self> {
        let data_dir = config_dir.clone();
        Ok(Self::with_directories(config_dir, data_dir))
    }

    fn with_directories(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        let persistence = ConfigPersistence::new(config_dir.join(CONFIG_FILE));
        Self {
            persistence,
            config_dir,
            data_dir,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the full config file path
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Directory for saved book positions, honouring `storage.positions_dir`
    pub fn positions_dir(&self, config: &Config) -> PathBuf {
        config
            .storage
            .positions_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join(POSITIONS_DIR))
    }

    /// Loads the configuration from file
    ///
    /// A missing file yields defaults; a corrupted file is an error.
    pub fn load(&self) -> ConfigResult<Config> {
        self.persistence.load()
    }

    /// Loads the configuration, falling back to defaults on any error
    pub fn load_or_default(&self) -> Config {
        match self.load() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config: {}, using defaults", e);
                Config::default()
            }
        }
    }

    /// Validates and atomically saves the configuration
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        self.persistence.save(config)
    }

    /// Loads the config, applies `update_fn` and saves the result
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use earmark_config::ConfigManager;
    /// # let manager = ConfigManager::new().unwrap();
    /// manager.update(|config| {
    ///     config.player.jump_back_ms = 5000;
    /// }).expect("Failed to update config");
    /// ```
    pub fn update<F>(&self, update_fn: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.load()?;
        update_fn(&mut config);
        self.save(&config)
    }

    /// Writes a default config file if none exists
    ///
    /// Returns Ok(true) if a new file was created.
    pub fn initialize(&self) -> ConfigResult<bool> {
        if self.config_path().exists() {
            log::info!(
                "Config file already exists at {}",
                self.config_path().display()
            );
            return Ok(false);
        }

        self.save(&Config::default())?;
        log::info!("Generated default config at {}", self.config_path().display());
        Ok(true)
    }

    /// Overwrites the config file with default values
    pub fn reset(&self) -> ConfigResult<()> {
        self.save(&Config::default())
    }

    /// Validates the current configuration file
    ///
    /// Returns every rejected setting, or an empty list if valid.
    pub fn validate(&self) -> ConfigResult<Vec<ValidationError>> {
        Ok(self.load()?.validate().err().unwrap_or_default())
    }

    /// Loads the config and applies environment variable overrides
    ///
    /// Variables follow the pattern `EARMARK_SECTION_FIELD`, for example
    /// `EARMARK_PLAYER_JUMP_BACK_MS=5000`. Unparsable values are ignored.
    pub fn load_with_env_overrides(&self) -> ConfigResult<Config> {
        let mut config = self.load()?;

        if let Some(ms) = env_parse::<u64>("EARMARK_PLAYER_JUMP_BACK_MS") {
            config.player.jump_back_ms = ms;
        }

        if let Some(speed) = env_parse::<f32>("EARMARK_PLAYER_PLAYBACK_SPEED") {
            config.player.playback_speed = speed;
        }

        if let Some(ms) = env_parse::<u64>("EARMARK_PLAYER_PROGRESS_INTERVAL_MS") {
            config.player.progress_interval_ms = ms;
        }

        if let Some(enabled) = env_parse::<bool>("EARMARK_PLAYER_PITCH_CORRECTION") {
            config.player.pitch_correction = enabled;
        }

        if let Ok(dir) = std::env::var("EARMARK_STORAGE_POSITIONS_DIR") {
            config.storage.positions_dir = Some(PathBuf::from(dir));
        }

        if let Err(errors) = config.validate() {
            log::warn!(
                "Config validation warnings after env overrides: {}",
                describe(&errors)
            );
        }

        Ok(config)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let value = std::env::var(name).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            log::warn!("Ignoring unparsable value for {}: {}", name, value);
            None
        }
    }
}
