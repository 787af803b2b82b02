//! Earmark core: the audiobook position model and its persistence
//!
//! [`AudioBook`] keeps the ordered file list, lazily learned file lengths and
//! the listener's `(file, offset)` position. [`BookStore`] implementations keep
//! that state across restarts.

pub mod error;
pub mod store;
pub mod types;

pub use error::{BookError, BookResult};
pub use store::{BookStore, JsonBookStore, MemoryBookStore, SharedBook};
pub use types::{
    AudioBook, BookFile, BookId, BookPosition, Duration, MissingDurations, Timestamp, Validator,
};
