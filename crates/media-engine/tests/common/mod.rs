//! Test doubles shared by the orchestrator integration tests

#![allow(dead_code)]

use crossbeam_channel::{Receiver, Sender};
use earmark_config::PlayerConfig;
use earmark_core::{AudioBook, Duration, MemoryBookStore, SharedBook};
use earmark_media_engine::{
    AudioEngine, AudioFocus, Collaborators, EngineError, EngineEvent, EngineFactory, EngineHandle,
    EngineResult, GestureDetector, PlaybackEvent, PlaybackNotifier, PlaybackOrchestrator, Signal,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

pub fn path(name: &str) -> PathBuf {
    PathBuf::from(format!("/books/test/{}", name))
}

/// Builds a book from `(file name, known duration in ms)` pairs
pub fn book(files: &[(&str, Option<u64>)]) -> SharedBook {
    let mut book = AudioBook::new("Test Book", files.iter().map(|(name, _)| path(name))).unwrap();
    for (name, duration) in files {
        if let Some(duration) = duration {
            book.offer_file_duration(&path(name), ms(*duration));
        }
    }
    SharedBook::new(book)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Speed(f32),
    Probe(EngineHandle, PathBuf),
    Play(EngineHandle, PathBuf, Duration),
    Pause(EngineHandle),
    Stop(EngineHandle),
    Release(EngineHandle),
}

impl Call {
    fn handle(&self) -> Option<EngineHandle> {
        match self {
            Call::Speed(_) => None,
            Call::Probe(handle, _)
            | Call::Play(handle, _, _)
            | Call::Pause(handle)
            | Call::Stop(handle)
            | Call::Release(handle) => Some(*handle),
        }
    }
}

#[derive(Debug, Default)]
struct EngineState {
    calls: Vec<Call>,
    position: Option<Duration>,
    refused_plays: usize,
}

/// What the scripted engine was asked to do, readable after it moved into
/// the orchestrator
#[derive(Debug, Clone, Default)]
pub struct EngineLog(Arc<Mutex<EngineState>>);

impl EngineLog {
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().calls.clone()
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut self.0.lock().unwrap().calls)
    }

    pub fn set_position(&self, position: Option<Duration>) {
        self.0.lock().unwrap().position = position;
    }

    /// Makes the next `play` fail as if the worker had died
    pub fn refuse_next_play(&self) {
        self.0.lock().unwrap().refused_plays += 1;
    }

    fn take_refusal(&self) -> bool {
        let mut state = self.0.lock().unwrap();
        if state.refused_plays == 0 {
            return false;
        }
        state.refused_plays -= 1;
        true
    }

    /// Handle of the most recent engine operation
    pub fn last_handle(&self) -> EngineHandle {
        self.0
            .lock()
            .unwrap()
            .calls
            .iter()
            .rev()
            .find_map(Call::handle)
            .expect("engine has not been used yet")
    }

    fn record(&self, call: Call) {
        self.0.lock().unwrap().calls.push(call);
    }
}

/// Records calls and answers release asynchronously, like a real engine
pub struct ScriptedEngine {
    log: EngineLog,
    signals: Sender<Signal>,
}

impl AudioEngine for ScriptedEngine {
    fn set_playback_speed(&mut self, speed: f32) -> EngineResult<()> {
        self.log.record(Call::Speed(speed));
        Ok(())
    }

    fn probe_duration(&mut self, handle: EngineHandle, file: &Path) -> EngineResult<()> {
        self.log.record(Call::Probe(handle, file.to_path_buf()));
        Ok(())
    }

    fn play(&mut self, handle: EngineHandle, file: &Path, offset: Duration) -> EngineResult<()> {
        self.log.record(Call::Play(handle, file.to_path_buf(), offset));
        if self.log.take_refusal() {
            return Err(EngineError::InvalidState("engine worker is gone".to_string()));
        }
        self.log.set_position(Some(offset));
        Ok(())
    }

    fn pause(&mut self, handle: EngineHandle) -> EngineResult<()> {
        self.log.record(Call::Pause(handle));
        Ok(())
    }

    fn stop(&mut self, handle: EngineHandle) {
        self.log.record(Call::Stop(handle));
    }

    fn position(&self) -> Option<Duration> {
        self.log.0.lock().unwrap().position
    }

    fn release(&mut self, handle: EngineHandle) {
        self.log.record(Call::Release(handle));
        self.signals
            .send(Signal::Engine {
                handle,
                event: EngineEvent::Released,
            })
            .unwrap();
    }
}

pub struct ScriptedFactory {
    pub log: EngineLog,
    pub fail: bool,
}

impl EngineFactory for ScriptedFactory {
    fn create(&mut self, signals: Sender<Signal>) -> EngineResult<Box<dyn AudioEngine>> {
        if self.fail {
            return Err(EngineError::OutputError("no audio device".to_string()));
        }
        Ok(Box::new(ScriptedEngine {
            log: self.log.clone(),
            signals,
        }))
    }
}

/// Ordered record of collaborator calls
#[derive(Debug, Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries().iter().any(|e| e == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }

    fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }
}

pub struct TracingFocus(pub Trace);

impl AudioFocus for TracingFocus {
    fn request(&mut self) {
        self.0.push("focus.request");
    }

    fn abandon(&mut self) {
        self.0.push("focus.abandon");
    }
}

pub struct TracingGestures(pub Trace);

impl GestureDetector for TracingGestures {
    fn enable(&mut self) {
        self.0.push("gestures.enable");
    }

    fn disable(&mut self) {
        self.0.push("gestures.disable");
    }
}

pub struct TracingNotifier(pub Trace);

impl PlaybackNotifier for TracingNotifier {
    fn show_active(&mut self, title: &str) {
        self.0.push(format!("notifier.show {}", title));
    }

    fn hide(&mut self) {
        self.0.push("notifier.hide");
    }
}

pub struct Harness {
    pub orchestrator: PlaybackOrchestrator,
    pub log: EngineLog,
    pub trace: Trace,
    pub store: MemoryBookStore,
    pub events: Receiver<PlaybackEvent>,
}

pub struct HarnessBuilder {
    config: PlayerConfig,
    gestures: bool,
    fail_factory: bool,
}

impl HarnessBuilder {
    pub fn config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn without_gestures(mut self) -> Self {
        self.gestures = false;
        self
    }

    pub fn failing_factory(mut self) -> Self {
        self.fail_factory = true;
        self
    }

    pub fn build(self) -> Harness {
        let log = EngineLog::default();
        let trace = Trace::default();
        let store = MemoryBookStore::new();

        let gestures: Option<Box<dyn GestureDetector>> = if self.gestures {
            Some(Box::new(TracingGestures(trace.clone())))
        } else {
            None
        };
        let collaborators = Collaborators {
            settings: Box::new(self.config),
            focus: Box::new(TracingFocus(trace.clone())),
            gestures,
            notifier: Box::new(TracingNotifier(trace.clone())),
            store: Box::new(store.clone()),
        };
        let factory = ScriptedFactory {
            log: log.clone(),
            fail: self.fail_factory,
        };

        let orchestrator = PlaybackOrchestrator::new(Box::new(factory), collaborators);
        let events = orchestrator.subscribe();

        Harness {
            orchestrator,
            log,
            trace,
            store,
            events,
        }
    }
}

pub fn harness() -> Harness {
    builder().build()
}

pub fn builder() -> HarnessBuilder {
    HarnessBuilder {
        config: PlayerConfig::default(),
        gestures: true,
        fail_factory: false,
    }
}

impl Harness {
    /// Delivers `event` as if the engine sent it for its latest operation
    pub fn engine_event(&mut self, event: EngineEvent) {
        let handle = self.log.last_handle();
        self.engine_event_for(handle, event);
    }

    pub fn engine_event_for(&mut self, handle: EngineHandle, event: EngineEvent) {
        self.orchestrator.dispatch(Signal::Engine { handle, event });
    }

    /// Starts `book` and confirms that audio started
    pub fn start_playing(&mut self, book: &SharedBook) {
        self.orchestrator.start_playback(book.clone()).unwrap();
        self.engine_event(EngineEvent::PlaybackStarted);
    }

    pub fn drain_events(&self) -> Vec<PlaybackEvent> {
        self.events.try_iter().collect()
    }

    pub fn plays(&self) -> Vec<(PathBuf, Duration)> {
        self.log
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Play(_, file, offset) => Some((file, offset)),
                _ => None,
            })
            .collect()
    }
}
