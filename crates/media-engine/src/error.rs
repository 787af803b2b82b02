use earmark_core::BookError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Output error: {0}")]
    OutputError(String),

    #[error("Seek error: {0}")]
    SeekError(String),

    #[error("Invalid speed: {0}")]
    InvalidSpeed(f32),

    /// The engine worker is gone and can no longer take commands
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// An orchestration call was made in a state that does not allow it
    #[error("Precondition violated: {0}")]
    Precondition(&'static str),

    #[error(transparent)]
    Book(#[from] BookError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
