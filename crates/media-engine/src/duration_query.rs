//! Learns the lengths of files whose duration is not yet known
//!
//! Files are probed strictly one at a time, in book order. A file that cannot
//! be probed keeps an unknown duration and the batch moves on.

use crate::engine::AudioEngine;
use crate::types::{EngineEvent, EngineHandle};
use earmark_core::SharedBook;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// What the orchestrator should do after the query handled an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStep {
    /// Still waiting for the engine
    Pending,
    /// Every file has been probed; reported exactly once
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryState {
    Running,
    Finished,
    Stopped,
    Released,
}

pub struct DurationQuery {
    book: SharedBook,
    handle: EngineHandle,
    pending: VecDeque<PathBuf>,
    current: Option<PathBuf>,
    state: QueryState,
}

impl DurationQuery {
    pub fn new<I>(book: SharedBook, handle: EngineHandle, files: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        Self {
            book,
            handle,
            pending: files.into_iter().collect(),
            current: None,
            state: QueryState::Running,
        }
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle
    }

    /// File currently being probed
    pub fn current_file(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    /// Files not yet handed to the engine
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Starts probing the first file
    ///
    /// An empty batch finishes right away without touching the engine.
    pub fn start(&mut self, engine: &mut dyn AudioEngine) -> QueryStep {
        log::debug!(
            "Probing {} files for duration ({})",
            self.pending.len(),
            self.handle
        );
        self.probe_next(engine)
    }

    pub fn on_event(&mut self, engine: &mut dyn AudioEngine, event: EngineEvent) -> QueryStep {
        if self.state != QueryState::Running {
            log::debug!("Duration query no longer running, ignoring {:?}", event);
            return QueryStep::Pending;
        }

        match event {
            EngineEvent::DurationReady { file, duration } => {
                if self.current.as_ref() != Some(&file) {
                    log::debug!("Ignoring duration for unexpected file {}", file.display());
                    return QueryStep::Pending;
                }
                self.book.lock().offer_file_duration(&file, duration);
                self.probe_next(engine)
            }
            EngineEvent::ProbeFailed { file, reason } => {
                if self.current.as_ref() != Some(&file) {
                    return QueryStep::Pending;
                }
                log::warn!("Could not determine duration of {}: {}", file.display(), reason);
                self.probe_next(engine)
            }
            other => {
                log::debug!("Duration query ignoring {:?}", other);
                QueryStep::Pending
            }
        }
    }

    /// Cancels the in-flight probe; the batch will never report finished
    pub fn stop(&mut self, engine: &mut dyn AudioEngine) {
        if self.state == QueryState::Running {
            engine.stop(self.handle);
            self.state = QueryState::Stopped;
            self.current = None;
        }
    }

    /// The engine was released underneath the query; it never finishes now
    pub fn on_player_released(&mut self) {
        self.state = QueryState::Released;
        self.current = None;
    }

    fn probe_next(&mut self, engine: &mut dyn AudioEngine) -> QueryStep {
        while let Some(file) = self.pending.pop_front() {
            match engine.probe_duration(self.handle, &file) {
                Ok(()) => {
                    self.current = Some(file);
                    return QueryStep::Pending;
                }
                Err(e) => {
                    log::warn!("Skipping duration probe for {}: {}", file.display(), e);
                }
            }
        }

        self.current = None;
        self.state = QueryState::Finished;
        QueryStep::Finished
    }
}
