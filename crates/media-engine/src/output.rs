//! Audio output on the default cpal device
//!
//! Decoding runs ahead of the device by a few blocks. Each block carries the
//! span of source time it was decoded from, so the output can tell how far
//! into the file the listener has actually heard.

use crate::error::{EngineError, EngineResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};
use earmark_core::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Blocks of interleaved samples queued ahead of the device
const QUEUED_BLOCKS: usize = 4;

/// Interleaved samples and the source time they cover, in milliseconds
#[derive(Debug, Clone, PartialEq)]
pub struct TimedBlock {
    pub samples: Vec<f32>,
    pub start_ms: f64,
    pub end_ms: f64,
}

/// A running output stream fed with [`TimedBlock`]s
///
/// The stream is not `Send`; it lives on the thread that opened it.
pub struct AudioOutput {
    stream: Stream,
    blocks: Sender<TimedBlock>,
    played_ms: Arc<AtomicU64>,
    device_name: String,
}

impl AudioOutput {
    /// Opens the default output device at the given format and starts it
    ///
    /// `start` is the source position of the first block that will be queued.
    pub fn open(sample_rate: u32, channels: u16, start: Duration) -> EngineResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| EngineError::OutputError("No output device available".to_string()))?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (blocks, block_rx) = bounded(QUEUED_BLOCKS);
        let played_ms = Arc::new(AtomicU64::new(start.as_millis()));
        let mut feed = BlockFeed::new(block_rx, Arc::clone(&played_ms));

        let error_device = device_name.clone();
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| feed.fill(data),
                move |err| {
                    log::error!("Audio output error on device '{}': {}", error_device, err);
                },
                None,
            )
            .map_err(|e| EngineError::OutputError(format!("Failed to build stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| EngineError::OutputError(format!("Failed to start stream: {}", e)))?;

        log::info!(
            "Audio output started on '{}' ({} Hz, {} channels)",
            device_name,
            sample_rate,
            channels
        );

        Ok(Self {
            stream,
            blocks,
            played_ms,
            device_name,
        })
    }

    /// Source position of the last sample handed to the device
    pub fn played(&self) -> Duration {
        Duration::from_millis(self.played_ms.load(Ordering::Acquire))
    }

    /// Queues a block without blocking, handing it back if the queue is full
    pub fn try_queue(&self, block: TimedBlock) -> Result<(), TimedBlock> {
        match self.blocks.try_send(block) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(block)) | Err(TrySendError::Disconnected(block)) => Err(block),
        }
    }

    /// Whether every queued block has been handed to the device
    pub fn is_drained(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn pause(&self) {
        if let Err(e) = self.stream.pause() {
            log::warn!("Failed to pause output on '{}': {}", self.device_name, e);
        }
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        log::debug!("Audio output on '{}' closed", self.device_name);
    }
}

/// Copies queued blocks into device buffers, writing silence on underrun
struct BlockFeed {
    blocks: Receiver<TimedBlock>,
    current: Option<TimedBlock>,
    cursor: usize,
    played_ms: Arc<AtomicU64>,
}

impl BlockFeed {
    fn new(blocks: Receiver<TimedBlock>, played_ms: Arc<AtomicU64>) -> Self {
        Self {
            blocks,
            current: None,
            cursor: 0,
            played_ms,
        }
    }

    fn fill(&mut self, data: &mut [f32]) {
        let mut written = 0;
        while written < data.len() {
            let remaining = self
                .current
                .as_ref()
                .map_or(0, |block| block.samples.len() - self.cursor);
            if remaining == 0 {
                match self.blocks.try_recv() {
                    Ok(block) => {
                        self.current = Some(block);
                        self.cursor = 0;
                        continue;
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }

            let Some(block) = self.current.as_ref() else {
                break;
            };
            let count = remaining.min(data.len() - written);
            data[written..written + count]
                .copy_from_slice(&block.samples[self.cursor..self.cursor + count]);
            self.cursor += count;
            written += count;
        }
        data[written..].fill(0.0);
        self.publish_played();
    }

    fn publish_played(&self) {
        let Some(block) = self.current.as_ref() else {
            return;
        };
        let fraction = if block.samples.is_empty() {
            1.0
        } else {
            self.cursor as f64 / block.samples.len() as f64
        };
        let played = block.start_ms + (block.end_ms - block.start_ms) * fraction;
        self.played_ms.store(played as u64, Ordering::Release);
    }
}
