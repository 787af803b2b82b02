//! Error types for the position model and book persistence

use std::path::PathBuf;
use thiserror::Error;

/// Result type for book operations
pub type BookResult<T> = Result<T, BookError>;

/// Errors raised by [`AudioBook`](crate::AudioBook) and the book stores
#[derive(Debug, Error)]
pub enum BookError {
    /// A book must contain at least one file
    #[error("Book has no files")]
    NoFiles,

    /// The same file appears twice in the playback order
    #[error("File listed twice in book: {path}")]
    DuplicateFile { path: PathBuf },

    /// Elapsed time was derived across a file whose length is still unknown
    #[error("Duration of file {file_index} is not known yet")]
    UnknownDuration { file_index: usize },

    /// A stored book failed validation when it was loaded
    #[error("Stored book {id} is invalid: {reason}")]
    InvalidStoredBook { id: String, reason: String },

    /// Failed to read a stored book
    #[error("Failed to read book state at {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write a stored book
    #[error("Failed to write book state at {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Stored book state could not be (de)serialized
    #[error("Failed to serialize book state: {0}")]
    SerializeError(#[from] serde_json::Error),
}
