//! Media Engine - playback orchestration for Earmark
//!
//! [`PlaybackOrchestrator`] turns "play this book" into engine commands:
//! it probes files whose lengths are unknown, resumes a little before the
//! saved position, follows the book file after file and tears everything
//! down on request, on audio focus loss or when the device is laid face down.
//!
//! The engine itself is abstract ([`AudioEngine`]); [`ThreadedEngine`] is the
//! symphonia + cpal implementation.

mod collaborators;
mod decoder;
mod duration_query;
mod engine;
mod error;
mod events;
mod orchestrator;
mod output;
mod playback_thread;
mod session;
mod speed;
mod types;

#[cfg(test)]
mod test_support;

pub use collaborators::{
    AudioFocus, GestureDetector, LogNotifier, PlaybackNotifier, SettingsProvider, UnmanagedFocus,
};
pub use decoder::{AudioDecoder, DecodedAudio};
pub use duration_query::{DurationQuery, QueryStep};
pub use engine::{AudioEngine, EngineFactory};
pub use error::{EngineError, EngineResult};
pub use events::{EventBus, PlaybackEvent};
pub use orchestrator::{Collaborators, PlaybackOrchestrator};
pub use output::AudioOutput;
pub use playback_thread::{ThreadedEngine, ThreadedEngineFactory};
pub use session::{PlaybackSession, SessionState, SessionStep};
pub use speed::{Speed, SpeedProcessor};
pub use types::{EngineEvent, EngineHandle, FocusChange, Signal};
