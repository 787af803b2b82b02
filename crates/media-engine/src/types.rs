//! Messages exchanged between the engine, the outside world and the
//! orchestrator

use earmark_core::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identifies which controller an engine operation was issued for
///
/// The orchestrator hands out a new handle for every controller it creates.
/// Engines tag each callback with the handle of the operation that caused it,
/// so callbacks for a superseded controller can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineHandle(u64);

impl EngineHandle {
    pub const fn new(generation: u64) -> Self {
        Self(generation)
    }

    pub fn generation(&self) -> u64 {
        self.0
    }

    /// The handle that follows this one
    pub fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Callbacks from an audio engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The playable length of a file is known
    ///
    /// Sent by probes, and by playback once the playing file has been opened.
    DurationReady { file: PathBuf, duration: Duration },

    /// A probe could not determine the length of a file
    ProbeFailed { file: PathBuf, reason: String },

    /// Audio for the requested file is now actually being produced
    PlaybackStarted,

    /// Periodic report of the offset within the playing file
    Progress { position: Duration },

    /// The playing file reached its end
    FileEnded,

    /// Playback failed and cannot continue
    Error { reason: String },

    /// The engine let go of its audio resources
    Released,
}

/// Audio focus transitions reported by the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusChange {
    Gain,
    Loss,
    /// Short interruption, such as a phone call
    LossTransient,
    /// Short interruption that only asks us to lower the volume
    LossTransientCanDuck,
}

impl FocusChange {
    /// Whether this transition ends the listening session
    pub fn stops_playback(&self) -> bool {
        matches!(self, FocusChange::Loss | FocusChange::LossTransient)
    }
}

/// Everything that arrives asynchronously on the control thread
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Engine {
        handle: EngineHandle,
        event: EngineEvent,
    },
    /// The device was laid face down
    FaceDown,
    AudioFocus(FocusChange),
}
