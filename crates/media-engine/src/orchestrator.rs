//! Owns a listening session from start request to engine release
//!
//! At most one controller is active at a time: a [`DurationQuery`] while file
//! lengths are being learned, then a [`PlaybackSession`]. The orchestrator
//! owns the single engine instance they both drive, and every asynchronous
//! input reaches it as a [`Signal`] on one channel, handled on the thread that
//! owns the orchestrator.
//!
//! Teardown is observable in two steps: [`PlaybackEvent::Stopping`] as soon
//! as playback is abandoned, and [`PlaybackEvent::Stopped`] once the engine
//! confirms release.

use crate::collaborators::{AudioFocus, GestureDetector, PlaybackNotifier, SettingsProvider};
use crate::duration_query::{DurationQuery, QueryStep};
use crate::engine::{AudioEngine, EngineFactory};
use crate::error::{EngineError, EngineResult};
use crate::events::{EventBus, PlaybackEvent};
use crate::session::{PlaybackSession, SessionState, SessionStep};
use crate::types::{EngineEvent, EngineHandle, Signal};
use crossbeam_channel::{unbounded, Receiver, Sender};
use earmark_core::{BookStore, Duration, SharedBook};
use std::path::Path;

/// External services handed to the orchestrator
pub struct Collaborators {
    pub settings: Box<dyn SettingsProvider>,
    pub focus: Box<dyn AudioFocus>,
    /// Absent when the device has no suitable sensors
    pub gestures: Option<Box<dyn GestureDetector>>,
    pub notifier: Box<dyn PlaybackNotifier>,
    pub store: Box<dyn BookStore>,
}

/// The controller currently driving the engine
enum Controller {
    Idle,
    Probing(DurationQuery),
    Playing(PlaybackSession),
}

struct EngineSlot {
    engine: Box<dyn AudioEngine>,
    /// Handle of the newest controller; callbacks tagged otherwise are stale
    handle: EngineHandle,
}

pub struct PlaybackOrchestrator {
    factory: Box<dyn EngineFactory>,
    collaborators: Collaborators,
    engine: Option<EngineSlot>,
    controller: Controller,
    book: Option<SharedBook>,
    saved_revision: u64,
    last_handle: EngineHandle,
    gestures_enabled: bool,
    signal_tx: Sender<Signal>,
    signal_rx: Receiver<Signal>,
    events: EventBus,
}

impl PlaybackOrchestrator {
    pub fn new(factory: Box<dyn EngineFactory>, collaborators: Collaborators) -> Self {
        let (signal_tx, signal_rx) = unbounded();
        Self {
            factory,
            collaborators,
            engine: None,
            controller: Controller::Idle,
            book: None,
            saved_revision: 0,
            last_handle: EngineHandle::new(0),
            gestures_enabled: false,
            signal_tx,
            signal_rx,
            events: EventBus::new(),
        }
    }

    /// Sender for face-down, audio-focus and engine signals
    pub fn signal_sender(&self) -> Sender<Signal> {
        self.signal_tx.clone()
    }

    /// Receiver side of the signal channel, for use in `select!`
    pub fn signals(&self) -> Receiver<Signal> {
        self.signal_rx.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// True from `start_playback` until the engine confirms release
    pub fn is_in_playback_mode(&self) -> bool {
        self.engine.is_some()
    }

    /// True while file lengths are being probed
    pub fn is_probing(&self) -> bool {
        matches!(self.controller, Controller::Probing(_))
    }

    /// State of the playback session, if one is active
    pub fn session_state(&self) -> Option<SessionState> {
        match &self.controller {
            Controller::Playing(session) => Some(session.state()),
            _ => None,
        }
    }

    /// The book of the current listening session
    pub fn book(&self) -> Option<&SharedBook> {
        self.book.as_ref()
    }

    /// Starts a listening session for `book`
    ///
    /// Fails if a session is still in progress, including one that is
    /// stopping but whose engine has not been released yet.
    pub fn start_playback(&mut self, book: SharedBook) -> EngineResult<()> {
        if self.engine.is_some() {
            log::error!("start_playback called while playback is active");
            return Err(EngineError::Precondition("playback is already active"));
        }

        self.collaborators.focus.request();
        let mut engine = match self.factory.create(self.signal_tx.clone()) {
            Ok(engine) => engine,
            Err(e) => {
                self.collaborators.focus.abandon();
                return Err(e);
            }
        };

        if let Err(e) = engine.set_playback_speed(self.collaborators.settings.playback_speed()) {
            log::warn!("Could not apply playback speed: {}", e);
        }

        if self.collaborators.settings.stop_on_face_down() {
            if let Some(gestures) = self.collaborators.gestures.as_mut() {
                gestures.enable();
                self.gestures_enabled = true;
            }
        }

        let (title, missing) = {
            let book = book.lock();
            let missing: Vec<_> = book
                .files_with_no_duration()
                .map(Path::to_path_buf)
                .collect();
            (book.title().to_string(), missing)
        };
        self.collaborators.notifier.show_active(&title);

        let handle = self.allocate_handle();
        self.engine = Some(EngineSlot { engine, handle });
        self.saved_revision = book.lock().revision();
        self.book = Some(book.clone());

        if missing.is_empty() {
            log::info!("Starting playback of '{}'", title);
            self.start_session();
        } else {
            log::info!(
                "Starting playback of '{}' after probing {} files",
                title,
                missing.len()
            );
            let mut query = DurationQuery::new(book, handle, missing);
            let step = match self.engine.as_mut() {
                Some(slot) => query.start(slot.engine.as_mut()),
                None => QueryStep::Pending,
            };
            self.controller = Controller::Probing(query);
            if step == QueryStep::Finished {
                self.start_session();
            }
        }

        self.persist_if_changed();
        Ok(())
    }

    /// Pauses the session so the listener can choose where to resume
    pub fn pause_for_rewind(&mut self) -> EngineResult<()> {
        let result = match (&mut self.controller, self.engine.as_mut()) {
            (Controller::Playing(session), Some(slot)) => {
                session.pause_for_rewind(slot.engine.as_mut())
            }
            _ => {
                log::error!("pause_for_rewind called without an active playback session");
                Err(EngineError::Precondition("no active playback session"))
            }
        };
        self.persist_if_changed();
        result
    }

    /// Resumes at `total` listened time, possibly in an earlier file
    ///
    /// If the engine refuses the restart, playback is stopped and the error
    /// is returned.
    pub fn resume_from_rewind(&mut self, total: Duration) -> EngineResult<()> {
        let result = match (&mut self.controller, self.engine.as_mut()) {
            (Controller::Playing(session), Some(slot)) => {
                session.resume_from_rewind(slot.engine.as_mut(), total)
            }
            _ => {
                log::error!("resume_from_rewind called without an active playback session");
                Err(EngineError::Precondition("no active playback session"))
            }
        };

        match &result {
            Ok(()) | Err(EngineError::Precondition(_)) | Err(EngineError::Book(_)) => {}
            Err(e) => {
                log::warn!("Could not resume playback: {}", e);
                self.stop_playback();
            }
        }

        self.persist_if_changed();
        result
    }

    /// Stops whichever controller is active and releases the engine
    ///
    /// Does nothing when no controller is active.
    pub fn stop_playback(&mut self) {
        let Some(slot) = self.engine.as_mut() else {
            log::debug!("stop_playback: nothing is playing");
            return;
        };

        match &mut self.controller {
            Controller::Idle => {
                log::debug!("stop_playback: already stopping");
                return;
            }
            Controller::Probing(query) => query.stop(slot.engine.as_mut()),
            Controller::Playing(session) => session.stop(slot.engine.as_mut()),
        }

        log::info!("Stopping playback");
        self.on_playback_ended();
        self.release_engine();
        self.persist_if_changed();
    }

    /// Publishes the current listened time if playback is under way
    pub fn request_elapsed_time_sync(&mut self) {
        let elapsed = match (&self.controller, self.engine.as_ref()) {
            (Controller::Playing(session), Some(slot)) => {
                session.elapsed_now(slot.engine.as_ref())
            }
            _ => None,
        };

        if let (Some(elapsed), Some(book)) = (elapsed, self.book.as_ref()) {
            self.events.emit(PlaybackEvent::Progressed {
                book_id: book.id(),
                elapsed,
            });
        }
    }

    /// Stops any playback before the orchestrator goes away
    pub fn shutdown(&mut self) {
        self.stop_playback();
    }

    /// Handles every signal already queued, without blocking
    ///
    /// Returns the number of signals handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(signal) = self.signal_rx.try_recv() {
            self.dispatch(signal);
            handled += 1;
        }
        handled
    }

    /// Handles one asynchronous input
    pub fn dispatch(&mut self, signal: Signal) {
        match signal {
            Signal::FaceDown => {
                log::info!("Device face down");
                self.stop_playback();
            }
            Signal::AudioFocus(change) => {
                if change.stops_playback() {
                    log::info!("Audio focus {:?}", change);
                    self.stop_playback();
                } else {
                    log::debug!("Ignoring audio focus {:?}", change);
                }
            }
            Signal::Engine { handle, event } => self.on_engine_event(handle, event),
        }
        self.persist_if_changed();
    }

    fn on_engine_event(&mut self, handle: EngineHandle, event: EngineEvent) {
        let Some(slot) = self.engine.as_mut() else {
            log::debug!("Ignoring {:?} from released engine {}", event, handle);
            return;
        };
        if slot.handle != handle {
            log::debug!(
                "Ignoring {:?} from stale handle {} (current {})",
                event,
                handle,
                slot.handle
            );
            return;
        }

        match event {
            EngineEvent::Released => self.on_player_released(),
            EngineEvent::Error { reason } => {
                log::warn!("Engine error: {}", reason);
                self.stop_playback();
            }
            event => match &mut self.controller {
                Controller::Idle => {
                    log::debug!("No active controller for {:?}", event);
                }
                Controller::Probing(query) => {
                    if query.on_event(slot.engine.as_mut(), event) == QueryStep::Finished {
                        self.start_session();
                    }
                }
                Controller::Playing(session) => {
                    let step = session.on_event(slot.engine.as_mut(), event);
                    self.on_session_step(step);
                }
            },
        }
    }

    fn on_session_step(&mut self, step: SessionStep) {
        match step {
            SessionStep::Idle => {}
            SessionStep::Progressed(elapsed) => {
                if let Some(book) = self.book.as_ref() {
                    self.events.emit(PlaybackEvent::Progressed {
                        book_id: book.id(),
                        elapsed,
                    });
                }
            }
            SessionStep::BookFinished => {
                self.on_playback_ended();
                self.release_engine();
            }
            SessionStep::Failed(reason) => {
                log::warn!("Playback failed: {}", reason);
                self.stop_playback();
            }
        }
    }

    /// Replaces the duration query with a playback session
    fn start_session(&mut self) {
        let Some(book) = self.book.clone() else {
            return;
        };
        let handle = self.allocate_handle();
        let Some(slot) = self.engine.as_mut() else {
            return;
        };
        slot.handle = handle;

        let jump_back = self.collaborators.settings.jump_back();
        let (file, offset) = {
            let book = book.lock();
            let position = book.position();
            (
                book.current_file().path().to_path_buf(),
                position.offset.saturating_sub(jump_back),
            )
        };

        let mut session = PlaybackSession::new(book, handle);
        let started = session.start(slot.engine.as_mut(), &file, offset);
        self.controller = Controller::Playing(session);

        if let Err(e) = started {
            log::warn!("Could not start playback of {}: {}", file.display(), e);
            self.stop_playback();
        }
    }

    /// First teardown milestone: controllers gone, auxiliary resources dropped
    fn on_playback_ended(&mut self) {
        self.controller = Controller::Idle;
        if self.gestures_enabled {
            if let Some(gestures) = self.collaborators.gestures.as_mut() {
                gestures.disable();
            }
            self.gestures_enabled = false;
        }
        self.collaborators.focus.abandon();
        self.events.emit(PlaybackEvent::Stopping);
    }

    fn release_engine(&mut self) {
        if let Some(slot) = self.engine.as_mut() {
            slot.engine.release(slot.handle);
        }
    }

    /// Second teardown milestone: the engine is gone
    fn on_player_released(&mut self) {
        match &mut self.controller {
            Controller::Idle => {}
            Controller::Probing(query) => query.on_player_released(),
            Controller::Playing(session) => session.on_player_released(),
        }
        if !matches!(self.controller, Controller::Idle) {
            log::info!("Engine released while a controller was active");
            self.on_playback_ended();
        }

        self.engine = None;
        self.collaborators.notifier.hide();
        self.events.emit(PlaybackEvent::Stopped);
        log::info!("Playback stopped");

        self.persist_if_changed();
        self.book = None;
    }

    fn allocate_handle(&mut self) -> EngineHandle {
        self.last_handle = self.last_handle.next();
        self.last_handle
    }

    fn persist_if_changed(&mut self) {
        let Some(book) = self.book.as_ref() else {
            return;
        };
        let book = book.lock();
        if book.revision() == self.saved_revision {
            return;
        }
        match self.collaborators.store.save(&book) {
            Ok(()) => self.saved_revision = book.revision(),
            Err(e) => log::warn!("Failed to save position of '{}': {}", book.title(), e),
        }
    }
}

impl Drop for PlaybackOrchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
