//! Audiobook position model
//!
//! An [`AudioBook`] is an ordered list of files plus the listener's position in
//! it. File lengths are learned lazily (probing is expensive) and never revert
//! to unknown once recorded. The position is a `(file index, offset)` pair; the
//! "elapsed time" view of it is only defined while every earlier file has a
//! known length.

use crate::error::{BookError, BookResult};
use crate::types::{Duration, Timestamp, Validator};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Unique identifier for a book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookId(Uuid);

impl BookId {
    /// Creates a new random BookId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derives a stable BookId from the book's location on disk
    ///
    /// The same directory always yields the same id, which is what lets a
    /// saved position be found again after a restart.
    pub fn from_path(path: &Path) -> Self {
        Self(Uuid::new_v5(
            &Uuid::NAMESPACE_URL,
            path.to_string_lossy().as_bytes(),
        ))
    }

    /// Creates a BookId from a UUID string
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Returns the BookId as a string
    pub fn as_string(&self) -> String {
        self.0.to_string()
    }
}

impl Default for BookId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One audio file of a book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookFile {
    path: PathBuf,
    duration: Option<Duration>,
}

impl BookFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            duration: None,
        }
    }

    /// Location of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Playable length, once known
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
}

/// Listener position: which file, and how far into it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookPosition {
    pub file_index: usize,
    pub offset: Duration,
}

impl BookPosition {
    pub fn new(file_index: usize, offset: Duration) -> Self {
        Self { file_index, offset }
    }
}

/// A multi-file audiobook and the listener's position in it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioBook {
    id: BookId,
    title: String,
    files: Vec<BookFile>,
    position: BookPosition,
    last_updated: Timestamp,
    /// Bumped on every state change; lets owners persist only when needed.
    #[serde(skip)]
    revision: u64,
}

impl AudioBook {
    /// Creates a book with a random id
    pub fn new<I>(title: impl Into<String>, files: I) -> BookResult<Self>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        Self::with_id(BookId::new(), title, files)
    }

    /// Creates a book with a caller-chosen id
    ///
    /// The file order given here is the playback order and never changes.
    pub fn with_id<I>(id: BookId, title: impl Into<String>, files: I) -> BookResult<Self>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut seen = HashSet::new();
        let mut book_files = Vec::new();
        for path in files {
            if !seen.insert(path.clone()) {
                return Err(BookError::DuplicateFile { path });
            }
            book_files.push(BookFile::new(path));
        }

        if book_files.is_empty() {
            return Err(BookError::NoFiles);
        }

        Ok(Self {
            id,
            title: title.into(),
            files: book_files,
            position: BookPosition::default(),
            last_updated: Timestamp::now(),
            revision: 0,
        })
    }

    pub fn id(&self) -> BookId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn files(&self) -> &[BookFile] {
        &self.files
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Current listener position
    pub fn position(&self) -> BookPosition {
        self.position
    }

    /// The file the position points into
    pub fn current_file(&self) -> &BookFile {
        &self.files[self.position.file_index]
    }

    /// When the position or a duration last changed
    pub fn last_updated(&self) -> Timestamp {
        self.last_updated
    }

    /// Monotonic change counter (not persisted)
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Records the length of `file` unless one is already known
    ///
    /// The first recorded value wins; later, differing reports for the same
    /// file are ignored. Returns true if the value was recorded.
    pub fn offer_file_duration(&mut self, file: &Path, duration: Duration) -> bool {
        let Some(index) = self.files.iter().position(|f| f.path == file) else {
            log::warn!(
                "Duration offered for a file not in book '{}': {}",
                self.title,
                file.display()
            );
            return false;
        };

        let entry = &mut self.files[index];
        match entry.duration {
            Some(known) => {
                if known != duration {
                    log::debug!(
                        "Ignoring duration {}ms for {}, already known as {}ms",
                        duration.as_millis(),
                        file.display(),
                        known.as_millis()
                    );
                }
                false
            }
            None => {
                entry.duration = Some(duration);
                if index == self.position.file_index && self.position.offset > duration {
                    self.position.offset = duration;
                }
                self.touch();
                true
            }
        }
    }

    /// Moves to the start of the next file
    ///
    /// Returns false (and changes nothing) when already at the last file,
    /// which the caller must treat as "book finished".
    pub fn advance_file(&mut self) -> bool {
        let next = self.position.file_index + 1;
        if next >= self.files.len() {
            return false;
        }
        self.set_position(BookPosition::new(next, Duration::ZERO));
        true
    }

    /// Sets the offset within the current file
    ///
    /// Clamped to the file's length when that is known.
    pub fn update_position(&mut self, offset: Duration) {
        let offset = match self.current_file().duration {
            Some(duration) => offset.min(duration),
            None => offset,
        };
        self.set_position(BookPosition::new(self.position.file_index, offset));
    }

    /// Re-derives `(file, offset)` from a total elapsed time
    ///
    /// Walks file lengths from the first file. Targets past the end of the
    /// book land at the end of the last file. Fails, leaving the position
    /// untouched, if the walk has to cross a file of unknown length.
    pub fn update_total_position(&mut self, total: Duration) -> BookResult<()> {
        let last = self.files.len() - 1;
        let mut remaining = total;

        for (index, file) in self.files.iter().enumerate() {
            if remaining.is_zero() {
                self.set_position(BookPosition::new(index, Duration::ZERO));
                return Ok(());
            }

            if index == last {
                let offset = match file.duration {
                    Some(duration) => remaining.min(duration),
                    None => remaining,
                };
                self.set_position(BookPosition::new(index, offset));
                return Ok(());
            }

            let duration = file
                .duration
                .ok_or(BookError::UnknownDuration { file_index: index })?;
            if remaining < duration {
                self.set_position(BookPosition::new(index, remaining));
                return Ok(());
            }
            remaining = remaining.saturating_sub(duration);
        }

        Ok(())
    }

    /// Returns to the very beginning of the book
    pub fn reset_position(&mut self) {
        self.set_position(BookPosition::default());
    }

    /// Files whose length is still unknown, in book order
    ///
    /// The iterator borrows the book, so it is a consistent snapshot; clone it
    /// to walk the sequence again.
    pub fn files_with_no_duration(&self) -> MissingDurations<'_> {
        MissingDurations {
            files: self.files.iter(),
        }
    }

    /// Sum of all file lengths, if every one is known
    pub fn total_duration(&self) -> Option<Duration> {
        self.files
            .iter()
            .try_fold(Duration::ZERO, |acc, f| f.duration.map(|d| acc + d))
    }

    /// Elapsed time at the stored position
    pub fn elapsed(&self) -> BookResult<Duration> {
        self.elapsed_at(self.position.offset)
    }

    /// Elapsed time if the current file were at `offset`
    ///
    /// Requires the lengths of all files before the current one.
    pub fn elapsed_at(&self, offset: Duration) -> BookResult<Duration> {
        let mut elapsed = Duration::ZERO;
        for (index, file) in self.files[..self.position.file_index].iter().enumerate() {
            let duration = file
                .duration
                .ok_or(BookError::UnknownDuration { file_index: index })?;
            elapsed = elapsed + duration;
        }
        Ok(elapsed + offset)
    }

    /// Takes over durations and position from a previously saved copy
    ///
    /// Used when the file list was rescanned: lengths are carried over for
    /// files that still exist, and the position follows its file if that file
    /// is still part of the book. Otherwise the position is left at the start.
    pub fn adopt_progress(&mut self, saved: &AudioBook) {
        for saved_file in &saved.files {
            if let Some(duration) = saved_file.duration {
                self.offer_file_duration(&saved_file.path, duration);
            }
        }

        let saved_path = &saved.current_file().path;
        if let Some(index) = self.files.iter().position(|f| &f.path == saved_path) {
            self.set_position(BookPosition::new(index, Duration::ZERO));
            self.update_position(saved.position.offset);
        }
    }

    fn set_position(&mut self, position: BookPosition) {
        if self.position != position {
            self.position = position;
            self.touch();
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.last_updated = Timestamp::now();
    }
}

impl PartialEq for AudioBook {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.title == other.title
            && self.files == other.files
            && self.position == other.position
    }
}

impl Validator for AudioBook {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.title.trim().is_empty() {
            errors.push("Title cannot be empty".to_string());
        }

        if self.files.is_empty() {
            errors.push("Book must contain at least one file".to_string());
        } else if self.position.file_index >= self.files.len() {
            errors.push(format!(
                "File index {} out of range (book has {} files)",
                self.position.file_index,
                self.files.len()
            ));
        } else if let Some(duration) = self.current_file().duration {
            if self.position.offset > duration {
                errors.push(format!(
                    "Offset {}ms is past the end of the current file ({}ms)",
                    self.position.offset.as_millis(),
                    duration.as_millis()
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Iterator over the files of a book that still lack a duration
#[derive(Debug, Clone)]
pub struct MissingDurations<'a> {
    files: std::slice::Iter<'a, BookFile>,
}

impl<'a> Iterator for MissingDurations<'a> {
    type Item = &'a Path;

    fn next(&mut self) -> Option<Self::Item> {
        self.files
            .find(|f| f.duration.is_none())
            .map(|f| f.path.as_path())
    }
}
