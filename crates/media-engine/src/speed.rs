use crate::error::{EngineError, EngineResult};

/// Playback speed multiplier
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Speed(f32);

impl Speed {
    pub const MIN: f32 = 0.5;
    pub const MAX: f32 = 3.0;
    pub const NORMAL: Self = Self(1.0);

    pub fn new(value: f32) -> EngineResult<Self> {
        if !value.is_finite() || !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(EngineError::InvalidSpeed(value));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f32 {
        self.0
    }

    pub fn is_normal(&self) -> bool {
        (self.0 - 1.0).abs() < f32::EPSILON
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl std::fmt::Display for Speed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}x", self.0)
    }
}

/// Time-stretches interleaved blocks to a playback speed
///
/// With pitch correction on, windowed segments are overlap-added at a hop
/// scaled by the speed, which keeps voices at their natural pitch. Without it
/// the block is simply resampled by linear interpolation.
pub struct SpeedProcessor {
    channels: usize,
    speed: Speed,
    pitch_correction: bool,
}

impl SpeedProcessor {
    pub fn new(channels: u16) -> Self {
        Self {
            channels: usize::from(channels.max(1)),
            speed: Speed::NORMAL,
            pitch_correction: true,
        }
    }

    pub fn set_speed(&mut self, speed: Speed) {
        self.speed = speed;
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    pub fn set_pitch_correction(&mut self, enabled: bool) {
        self.pitch_correction = enabled;
    }

    pub fn process(&self, input: &[f32]) -> Vec<f32> {
        if input.is_empty() || self.speed.is_normal() {
            return input.to_vec();
        }

        let planes = self.deinterleave(input);
        let stretched: Vec<Vec<f32>> = if self.pitch_correction {
            planes.iter().map(|plane| self.overlap_add(plane)).collect()
        } else {
            planes.iter().map(|plane| self.interpolate(plane)).collect()
        };

        interleave(&stretched)
    }

    fn deinterleave(&self, input: &[f32]) -> Vec<Vec<f32>> {
        let frames = input.len() / self.channels;
        let mut planes = vec![Vec::with_capacity(frames); self.channels];
        for frame in input.chunks_exact(self.channels) {
            for (plane, &sample) in planes.iter_mut().zip(frame) {
                plane.push(sample);
            }
        }
        planes
    }

    fn output_frames(&self, input_frames: usize) -> usize {
        (input_frames as f32 / self.speed.value()) as usize
    }

    fn overlap_add(&self, plane: &[f32]) -> Vec<f32> {
        let input_frames = plane.len();
        let output_frames = self.output_frames(input_frames);
        let window_size = 1024.min(input_frames / 4).max(64);
        let hop_out = window_size / 2;
        let hop_in = ((hop_out as f32) * self.speed.value()).max(1.0) as usize;
        let window = hann_window(window_size);

        let mut output = vec![0.0f32; output_frames];
        let mut in_pos = 0;
        let mut out_pos = 0;
        while in_pos < input_frames && out_pos < output_frames {
            for (i, weight) in window.iter().enumerate() {
                let (Some(&sample), Some(slot)) =
                    (plane.get(in_pos + i), output.get_mut(out_pos + i))
                else {
                    break;
                };
                *slot += sample * weight;
            }
            in_pos += hop_in;
            out_pos += hop_out;
        }

        let peak = output.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));
        if peak > 1.0 {
            output.iter_mut().for_each(|s| *s /= peak);
        }
        output
    }

    fn interpolate(&self, plane: &[f32]) -> Vec<f32> {
        let speed = self.speed.value();
        (0..self.output_frames(plane.len()))
            .map(|out_frame| {
                let position = out_frame as f32 * speed;
                let index = position as usize;
                let frac = position - index as f32;
                match (plane.get(index), plane.get(index + 1)) {
                    (Some(&a), Some(&b)) => a + (b - a) * frac,
                    (Some(&a), None) => a,
                    _ => 0.0,
                }
            })
            .collect()
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = std::f32::consts::PI * i as f32 / (size - 1) as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

fn interleave(planes: &[Vec<f32>]) -> Vec<f32> {
    let frames = planes.iter().map(Vec::len).min().unwrap_or(0);
    let mut output = Vec::with_capacity(frames * planes.len());
    for frame in 0..frames {
        output.extend(planes.iter().map(|plane| plane[frame]));
    }
    output
}
