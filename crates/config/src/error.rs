//! Errors raised while loading, checking and saving `config.toml`

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {}: {source}", path.display())]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file exists but holds nothing; it is not silently replaced by defaults
    #[error("Config {} is empty", path.display())]
    EmptyFile { path: PathBuf },

    #[error("Cannot write config {}: {source}", path.display())]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot parse config {}: {source}", path.display())]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Cannot serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Refused on save; loading keeps invalid values and only warns
    #[error("Invalid config: {}", describe(.0))]
    Invalid(Vec<ValidationError>),

    #[error("Cannot create config directory {}: {source}", path.display())]
    DirectoryCreationError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot locate config directory: {reason}")]
    PathResolutionError { reason: String },

    #[error("Cannot back up previous config to {}: {source}", path.display())]
    BackupError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A rejected setting, named as it is written in the TOML file
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{section}.{key} {problem}")]
pub struct ValidationError {
    pub section: &'static str,
    pub key: &'static str,
    pub problem: Problem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    OutOfRange {
        value: String,
        min: String,
        max: String,
    },
    NotFinite,
    EmptyPath,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::OutOfRange { value, min, max } => {
                write!(f, "is {}, expected {} to {}", value, min, max)
            }
            Problem::NotFinite => write!(f, "is not a finite number"),
            Problem::EmptyPath => write!(f, "is an empty path"),
        }
    }
}

impl ValidationError {
    pub fn new(section: &'static str, key: &'static str, problem: Problem) -> Self {
        Self {
            section,
            key,
            problem,
        }
    }

    /// Dotted name, e.g. `player.jump_back_ms`
    pub fn field(&self) -> String {
        format!("{}.{}", self.section, self.key)
    }
}

pub(crate) fn describe(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ValidationError::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
