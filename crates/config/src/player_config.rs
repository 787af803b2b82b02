//! Player configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};

const SECTION: &str = "player";

/// Playback behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerConfig {
    /// How far to rewind when resuming, in milliseconds
    pub jump_back_ms: u64,

    /// Playback speed multiplier (0.5 - 3.0)
    pub playback_speed: f32,

    /// How often the engine reports progress, in milliseconds
    pub progress_interval_ms: u64,

    /// Stop playback when the device is laid face down
    pub stop_on_face_down: bool,

    /// Keep voices at their natural pitch when playing faster or slower
    pub pitch_correction: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            jump_back_ms: 2000,
            playback_speed: 1.0,
            progress_interval_ms: 1000,
            stop_on_face_down: true,
            pitch_correction: true,
        }
    }
}

impl ConfigSection for PlayerConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::in_range(self.jump_back_ms, 0, 60_000, SECTION, "jump_back_ms"),
            Validator::finite(self.playback_speed, SECTION, "playback_speed").and_then(|_| {
                Validator::in_range(self.playback_speed, 0.5, 3.0, SECTION, "playback_speed")
            }),
            Validator::in_range(
                self.progress_interval_ms,
                50,
                5000,
                SECTION,
                "progress_interval_ms",
            ),
        ])
    }

    fn merge(&mut self, other: Self) {
        self.jump_back_ms = other.jump_back_ms;
        self.playback_speed = other.playback_speed;
        self.progress_interval_ms = other.progress_interval_ms;
        self.stop_on_face_down = other.stop_on_face_down;
        self.pitch_correction = other.pitch_correction;
    }

    fn section_name(&self) -> &'static str {
        SECTION
    }
}
