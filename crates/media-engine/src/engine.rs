//! The audio engine capability
//!
//! An engine plays one file at a time, or probes a file for its length
//! without playing it. Every outcome is reported later as a [`Signal`] on the
//! channel the engine was created with, tagged with the [`EngineHandle`] of
//! the operation that caused it. No callback is ever delivered from inside the
//! call that triggered it.

use crate::error::EngineResult;
use crate::types::{EngineHandle, Signal};
use crossbeam_channel::Sender;
use earmark_core::Duration;
use std::path::Path;

pub trait AudioEngine: Send {
    /// Speed multiplier applied to all later playback
    fn set_playback_speed(&mut self, speed: f32) -> EngineResult<()>;

    /// Determines the length of `file` without producing audio
    ///
    /// Reports `DurationReady` or `ProbeFailed`.
    fn probe_duration(&mut self, handle: EngineHandle, file: &Path) -> EngineResult<()>;

    /// Starts playing `file` from `offset`, replacing any current playback
    ///
    /// Reports `PlaybackStarted` once audio is produced, then `Progress`
    /// periodically and `FileEnded` at the end.
    fn play(&mut self, handle: EngineHandle, file: &Path, offset: Duration) -> EngineResult<()>;

    /// Pauses playback, keeping the file open
    fn pause(&mut self, handle: EngineHandle) -> EngineResult<()>;

    /// Abandons the current probe or playback
    fn stop(&mut self, handle: EngineHandle);

    /// Offset within the playing file, if anything is playing
    fn position(&self) -> Option<Duration>;

    /// Frees the audio resources; reports `Released` when done
    fn release(&mut self, handle: EngineHandle);
}

/// Creates engine instances, one per listening session
pub trait EngineFactory: Send {
    fn create(&mut self, signals: Sender<Signal>) -> EngineResult<Box<dyn AudioEngine>>;
}
