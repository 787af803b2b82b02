//! Drives the engine through a book, file after file
//!
//! ```text
//! Starting -> Playing <-> PausedForRewind
//!               |
//!               v
//!           Advancing -> Playing | Finished
//! ```
//!
//! `Stopped` is reachable from every non-terminal state. Progress is only
//! recorded in `Playing`, which is entered when the engine confirms that
//! audio started, not when playback is requested.

use crate::engine::AudioEngine;
use crate::error::{EngineError, EngineResult};
use crate::types::{EngineEvent, EngineHandle};
use earmark_core::{Duration, SharedBook};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Playing,
    PausedForRewind,
    Advancing,
    Finished,
    Stopped,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Finished | SessionState::Stopped)
    }
}

/// What the orchestrator should do after the session handled an event
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStep {
    Idle,
    /// Listened time moved; publish it
    Progressed(Duration),
    /// The last file ended; position is back at the start of the book
    BookFinished,
    /// The engine could not continue with the next file
    Failed(String),
}

pub struct PlaybackSession {
    book: SharedBook,
    handle: EngineHandle,
    state: SessionState,
}

impl PlaybackSession {
    pub fn new(book: SharedBook, handle: EngineHandle) -> Self {
        Self {
            book,
            handle,
            state: SessionState::Starting,
        }
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn book(&self) -> &SharedBook {
        &self.book
    }

    /// Requests audio for `file` from `offset`
    pub fn start(
        &mut self,
        engine: &mut dyn AudioEngine,
        file: &Path,
        offset: Duration,
    ) -> EngineResult<()> {
        log::info!("Starting {} at {} ({})", file.display(), offset, self.handle);
        self.state = SessionState::Starting;
        engine.play(self.handle, file, offset)
    }

    pub fn on_event(&mut self, engine: &mut dyn AudioEngine, event: EngineEvent) -> SessionStep {
        if self.state.is_terminal() {
            log::debug!("Session {} is over, ignoring {:?}", self.handle, event);
            return SessionStep::Idle;
        }

        match event {
            EngineEvent::PlaybackStarted => {
                if matches!(self.state, SessionState::Starting | SessionState::Advancing) {
                    self.state = SessionState::Playing;
                }
                SessionStep::Idle
            }
            EngineEvent::Progress { position } => self.on_progress(position),
            EngineEvent::DurationReady { file, duration } => {
                self.book.lock().offer_file_duration(&file, duration);
                SessionStep::Idle
            }
            EngineEvent::FileEnded => self.on_file_ended(engine),
            other => {
                log::debug!("Session ignoring {:?}", other);
                SessionStep::Idle
            }
        }
    }

    fn on_progress(&mut self, position: Duration) -> SessionStep {
        if self.state != SessionState::Playing {
            log::trace!("Discarding progress while {:?}", self.state);
            return SessionStep::Idle;
        }

        let mut book = self.book.lock();
        book.update_position(position);
        match book.elapsed() {
            Ok(elapsed) => SessionStep::Progressed(elapsed),
            Err(e) => {
                log::debug!("Not publishing progress: {}", e);
                SessionStep::Idle
            }
        }
    }

    fn on_file_ended(&mut self, engine: &mut dyn AudioEngine) -> SessionStep {
        if !matches!(self.state, SessionState::Playing | SessionState::Starting) {
            log::debug!("Ignoring end of file while {:?}", self.state);
            return SessionStep::Idle;
        }

        self.state = SessionState::Advancing;
        let next = {
            let mut book = self.book.lock();
            if book.advance_file() {
                Some(book.current_file().path().to_path_buf())
            } else {
                book.reset_position();
                None
            }
        };

        match next {
            Some(file) => {
                log::info!("Continuing with {}", file.display());
                match engine.play(self.handle, &file, Duration::ZERO) {
                    Ok(()) => SessionStep::Idle,
                    Err(e) => SessionStep::Failed(e.to_string()),
                }
            }
            None => {
                log::info!("Reached the end of the book");
                self.state = SessionState::Finished;
                SessionStep::BookFinished
            }
        }
    }

    /// Pauses so the listener can pick a new position
    ///
    /// The offset reached so far is recorded first.
    pub fn pause_for_rewind(&mut self, engine: &mut dyn AudioEngine) -> EngineResult<()> {
        if self.state != SessionState::Playing {
            return Err(EngineError::Precondition("session is not playing"));
        }

        engine.pause(self.handle)?;
        if let Some(position) = engine.position() {
            self.book.lock().update_position(position);
        }
        self.state = SessionState::PausedForRewind;
        Ok(())
    }

    /// Commits a new listened time and restarts playback there
    ///
    /// This is a restart rather than an unpause, since the target may be in a
    /// different file.
    pub fn resume_from_rewind(
        &mut self,
        engine: &mut dyn AudioEngine,
        total: Duration,
    ) -> EngineResult<()> {
        if self.state != SessionState::PausedForRewind {
            return Err(EngineError::Precondition("session is not paused for rewind"));
        }

        let (file, offset): (PathBuf, Duration) = {
            let mut book = self.book.lock();
            book.update_total_position(total)?;
            (
                book.current_file().path().to_path_buf(),
                book.position().offset,
            )
        };
        self.start(engine, &file, offset)
    }

    /// Records where playback got to and abandons it
    pub fn stop(&mut self, engine: &mut dyn AudioEngine) {
        if self.state.is_terminal() {
            return;
        }

        if self.state == SessionState::Playing {
            if let Some(position) = engine.position() {
                self.book.lock().update_position(position);
            }
        }
        engine.stop(self.handle);
        self.state = SessionState::Stopped;
    }

    /// The engine went away on its own; nothing can be queried any more
    pub fn on_player_released(&mut self) {
        self.state = SessionState::Stopped;
    }

    /// Listened time at the engine's current offset, while playing
    pub fn elapsed_now(&self, engine: &dyn AudioEngine) -> Option<Duration> {
        if self.state != SessionState::Playing {
            return None;
        }
        let position = engine.position()?;
        self.book.lock().elapsed_at(position).ok()
    }
}
