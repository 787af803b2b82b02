//! Notifications published to UI collaborators

use crossbeam_channel::{unbounded, Receiver, Sender};
use earmark_core::{BookId, Duration};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

/// Observable playback milestones
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// Total listened time changed while playing
    Progressed { book_id: BookId, elapsed: Duration },

    /// Playback is being torn down; audio focus and gestures are released
    Stopping,

    /// The engine confirmed release; nothing is playing any more
    Stopped,
}

/// Fan-out of [`PlaybackEvent`]s to any number of subscribers
///
/// Cloning yields another handle to the same set of subscribers.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<PlaybackEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receives every event emitted after this call
    pub fn subscribe(&self) -> Receiver<PlaybackEvent> {
        let (tx, rx) = unbounded();
        self.lock().push(tx);
        rx
    }

    /// Sends `event` to all live subscribers
    ///
    /// Subscribers whose receiver was dropped are forgotten. Returns the
    /// number of subscribers that received the event.
    pub fn emit(&self, event: PlaybackEvent) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        log::trace!("Delivered {:?} to {} subscribers", event, subscribers.len());
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Sender<PlaybackEvent>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
