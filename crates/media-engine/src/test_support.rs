//! Engine double for controller unit tests

use crate::engine::AudioEngine;
use crate::error::{EngineError, EngineResult};
use crate::types::EngineHandle;
use earmark_core::{AudioBook, Duration, SharedBook};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Speed(f32),
    Probe(EngineHandle, PathBuf),
    Play(EngineHandle, PathBuf, Duration),
    Pause(EngineHandle),
    Stop(EngineHandle),
    Release(EngineHandle),
}

/// Records calls; never produces callbacks on its own
#[derive(Debug, Default)]
pub struct RecordingEngine {
    pub calls: Vec<Call>,
    pub position: Option<Duration>,
    pub unprobeable: HashSet<PathBuf>,
    pub fail_play: bool,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }
}

impl AudioEngine for RecordingEngine {
    fn set_playback_speed(&mut self, speed: f32) -> EngineResult<()> {
        self.calls.push(Call::Speed(speed));
        Ok(())
    }

    fn probe_duration(&mut self, handle: EngineHandle, file: &Path) -> EngineResult<()> {
        if self.unprobeable.contains(file) {
            return Err(EngineError::DecodeError("unreadable".to_string()));
        }
        self.calls.push(Call::Probe(handle, file.to_path_buf()));
        Ok(())
    }

    fn play(&mut self, handle: EngineHandle, file: &Path, offset: Duration) -> EngineResult<()> {
        if self.fail_play {
            return Err(EngineError::OutputError("no device".to_string()));
        }
        self.calls.push(Call::Play(handle, file.to_path_buf(), offset));
        self.position = Some(offset);
        Ok(())
    }

    fn pause(&mut self, handle: EngineHandle) -> EngineResult<()> {
        self.calls.push(Call::Pause(handle));
        Ok(())
    }

    fn stop(&mut self, handle: EngineHandle) {
        self.calls.push(Call::Stop(handle));
    }

    fn position(&self) -> Option<Duration> {
        self.position
    }

    fn release(&mut self, handle: EngineHandle) {
        self.calls.push(Call::Release(handle));
        self.position = None;
    }
}

pub fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

pub fn shared_book(files: &[&str]) -> SharedBook {
    let book = AudioBook::new("Unit Book", files.iter().map(PathBuf::from))
        .expect("valid book");
    SharedBook::new(book)
}
