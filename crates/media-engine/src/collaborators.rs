//! Services the orchestrator consumes but does not own
//!
//! They are injected at construction; nothing in this crate reaches for a
//! process-wide instance.

use earmark_config::PlayerConfig;
use earmark_core::Duration;

/// System-wide arbitration of the audio output
pub trait AudioFocus: Send {
    fn request(&mut self);
    fn abandon(&mut self);
}

/// Detects the device being laid face down
///
/// Detections are delivered as [`Signal::FaceDown`](crate::Signal::FaceDown).
pub trait GestureDetector: Send {
    fn enable(&mut self);
    fn disable(&mut self);
}

/// Tells the platform that playback is in progress
pub trait PlaybackNotifier: Send {
    fn show_active(&mut self, title: &str);
    fn hide(&mut self);
}

/// Listener preferences read when a session starts
pub trait SettingsProvider: Send {
    /// How far to rewind when resuming
    fn jump_back(&self) -> Duration;

    fn playback_speed(&self) -> f32;

    /// Whether a face-down gesture should stop playback
    fn stop_on_face_down(&self) -> bool {
        true
    }
}

impl SettingsProvider for PlayerConfig {
    fn jump_back(&self) -> Duration {
        Duration::from_millis(self.jump_back_ms)
    }

    fn playback_speed(&self) -> f32 {
        self.playback_speed
    }

    fn stop_on_face_down(&self) -> bool {
        self.stop_on_face_down
    }
}

/// Audio focus for platforms without arbitration
#[derive(Debug, Default)]
pub struct UnmanagedFocus;

impl AudioFocus for UnmanagedFocus {
    fn request(&mut self) {}

    fn abandon(&mut self) {}
}

/// Notifier that only logs
#[derive(Debug, Default)]
pub struct LogNotifier;

impl PlaybackNotifier for LogNotifier {
    fn show_active(&mut self, title: &str) {
        log::info!("Now playing: {}", title);
    }

    fn hide(&mut self) {
        log::info!("Playback inactive");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_config_provides_settings() {
        let config = PlayerConfig {
            jump_back_ms: 4500,
            playback_speed: 1.25,
            stop_on_face_down: false,
            ..Default::default()
        };

        assert_eq!(config.jump_back(), Duration::from_millis(4500));
        assert_eq!(SettingsProvider::playback_speed(&config), 1.25);
        assert!(!SettingsProvider::stop_on_face_down(&config));
    }
}
