//! Durable storage for book state
//!
//! The position model does not persist itself. Whoever owns a playback
//! session saves the book through a [`BookStore`] after it changes, so that a
//! restart resumes at the same file and millisecond.

use crate::error::{BookError, BookResult};
use crate::types::{AudioBook, BookId, Validator};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tempfile::NamedTempFile;

/// A book shared between its owner and the active playback controller
///
/// All mutation happens on the control thread; the mutex only makes the
/// book readable from UI threads.
#[derive(Debug, Clone)]
pub struct SharedBook(Arc<Mutex<AudioBook>>);

impl SharedBook {
    pub fn new(book: AudioBook) -> Self {
        Self(Arc::new(Mutex::new(book)))
    }

    /// Locks the book
    ///
    /// A panic on another thread cannot leave the book half-updated (every
    /// mutator completes before releasing), so a poisoned lock is recovered.
    pub fn lock(&self) -> MutexGuard<'_, AudioBook> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> BookId {
        self.lock().id()
    }

    /// Clones the current state of the book
    pub fn snapshot(&self) -> AudioBook {
        self.lock().clone()
    }
}

/// Persists book state between runs
pub trait BookStore: Send {
    /// Loads a previously saved book, if there is one
    fn load(&self, id: &BookId) -> BookResult<Option<AudioBook>>;

    /// Saves the current state of a book
    fn save(&self, book: &AudioBook) -> BookResult<()>;
}

/// In-memory store, for tests and embedders with their own persistence
#[derive(Debug, Clone, Default)]
pub struct MemoryBookStore {
    books: Arc<Mutex<HashMap<BookId, AudioBook>>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls so far
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BookStore for MemoryBookStore {
    fn load(&self, id: &BookId) -> BookResult<Option<AudioBook>> {
        let books = self.books.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(books.get(id).cloned())
    }

    fn save(&self, book: &AudioBook) -> BookResult<()> {
        self.books
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(book.id(), book.clone());
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}

/// Stores each book as `<book-id>.json` in a directory
///
/// Writes go through a temporary file and an atomic rename, so a crash
/// mid-save leaves the previous state intact.
#[derive(Debug, Clone)]
pub struct JsonBookStore {
    dir: PathBuf,
}

impl JsonBookStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the file a book is stored in
    pub fn path_for(&self, id: &BookId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn ensure_directory_exists(&self) -> BookResult<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|e| BookError::WriteError {
                path: self.dir.clone(),
                source: e,
            })?;
            log::info!("Created book state directory: {}", self.dir.display());
        }
        Ok(())
    }
}

impl BookStore for JsonBookStore {
    fn load(&self, id: &BookId) -> BookResult<Option<AudioBook>> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path).map_err(|e| BookError::ReadError {
            path: path.clone(),
            source: e,
        })?;
        let book: AudioBook = serde_json::from_str(&contents)?;

        if let Err(errors) = book.validate() {
            return Err(BookError::InvalidStoredBook {
                id: id.to_string(),
                reason: errors.join("; "),
            });
        }

        log::debug!("Loaded book state from {}", path.display());
        Ok(Some(book))
    }

    fn save(&self, book: &AudioBook) -> BookResult<()> {
        self.ensure_directory_exists()?;

        let path = self.path_for(&book.id());
        let json = serde_json::to_vec_pretty(book)?;

        let mut temp_file = NamedTempFile::new_in(&self.dir).map_err(|e| BookError::WriteError {
            path: self.dir.clone(),
            source: e,
        })?;
        temp_file
            .write_all(&json)
            .and_then(|_| temp_file.flush())
            .map_err(|e| BookError::WriteError {
                path: path.clone(),
                source: e,
            })?;
        temp_file.persist(&path).map_err(|e| BookError::WriteError {
            path: path.clone(),
            source: e.error,
        })?;

        log::debug!("Saved book state to {}", path.display());
        Ok(())
    }
}
