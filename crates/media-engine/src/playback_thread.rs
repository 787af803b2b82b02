//! An [`AudioEngine`] backed by a decoding worker thread
//!
//! Commands travel to the worker over a bounded channel. The worker owns the
//! symphonia decoder and the cpal stream, and reports back on the signal
//! channel the engine was created with.

use crate::decoder::AudioDecoder;
use crate::engine::{AudioEngine, EngineFactory};
use crate::error::{EngineError, EngineResult};
use crate::output::{AudioOutput, TimedBlock};
use crate::speed::{Speed, SpeedProcessor};
use crate::types::{EngineEvent, EngineHandle, Signal};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use earmark_config::PlayerConfig;
use earmark_core::Duration;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration as StdDuration, Instant};

/// How long the worker waits for a command while audio is flowing
const POLL_INTERVAL: StdDuration = StdDuration::from_millis(5);

/// Stored in the shared position when nothing is loaded
const NOT_PLAYING: u64 = u64::MAX;

#[derive(Debug)]
enum Command {
    Probe {
        handle: EngineHandle,
        file: PathBuf,
    },
    Play {
        handle: EngineHandle,
        file: PathBuf,
        offset: Duration,
    },
    Pause {
        handle: EngineHandle,
    },
    Stop {
        handle: EngineHandle,
    },
    SetSpeed(Speed),
    SetPitchCorrection(bool),
    Release {
        handle: EngineHandle,
    },
    /// Exit without reporting anything
    Shutdown,
}

/// Creates a [`ThreadedEngine`] per listening session
#[derive(Debug, Clone)]
pub struct ThreadedEngineFactory {
    progress_interval: StdDuration,
    pitch_correction: bool,
}

impl ThreadedEngineFactory {
    pub fn new(progress_interval: StdDuration) -> Self {
        Self {
            progress_interval,
            pitch_correction: true,
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(StdDuration::from_millis(config.progress_interval_ms))
            .with_pitch_correction(config.pitch_correction)
    }

    /// Without pitch correction, faster playback also raises the pitch
    pub fn with_pitch_correction(mut self, enabled: bool) -> Self {
        self.pitch_correction = enabled;
        self
    }
}

impl EngineFactory for ThreadedEngineFactory {
    fn create(&mut self, signals: Sender<Signal>) -> EngineResult<Box<dyn AudioEngine>> {
        let engine = ThreadedEngine::spawn(signals, self.progress_interval)?;
        if !self.pitch_correction {
            engine.send(Command::SetPitchCorrection(false))?;
        }
        Ok(Box::new(engine))
    }
}

pub struct ThreadedEngine {
    commands: Sender<Command>,
    signals: Sender<Signal>,
    position: Arc<AtomicU64>,
    worker: Option<thread::JoinHandle<()>>,
    released: bool,
}

impl ThreadedEngine {
    pub fn spawn(signals: Sender<Signal>, progress_interval: StdDuration) -> EngineResult<Self> {
        let (commands, command_rx) = bounded(16);
        let position = Arc::new(AtomicU64::new(NOT_PLAYING));

        let worker_signals = signals.clone();
        let worker_position = Arc::clone(&position);

        // The output stream is tied to the thread that opens it, so the
        // worker is assembled on its own thread
        let handle = thread::Builder::new()
            .name("earmark-engine".to_string())
            .spawn(move || {
                Worker {
                    commands: command_rx,
                    signals: worker_signals,
                    position: worker_position,
                    progress_interval,
                    speed: Speed::NORMAL,
                    pitch_correction: true,
                    current: None,
                }
                .run()
            })?;

        Ok(Self {
            commands,
            signals,
            position,
            worker: Some(handle),
            released: false,
        })
    }

    fn send(&self, command: Command) -> EngineResult<()> {
        if self.released {
            return Err(EngineError::InvalidState("engine has been released".to_string()));
        }
        self.commands
            .send(command)
            .map_err(|_| EngineError::InvalidState("engine worker has exited".to_string()))
    }
}

impl AudioEngine for ThreadedEngine {
    fn set_playback_speed(&mut self, speed: f32) -> EngineResult<()> {
        let speed = Speed::new(speed)?;
        self.send(Command::SetSpeed(speed))
    }

    fn probe_duration(&mut self, handle: EngineHandle, file: &Path) -> EngineResult<()> {
        self.send(Command::Probe {
            handle,
            file: file.to_path_buf(),
        })
    }

    fn play(&mut self, handle: EngineHandle, file: &Path, offset: Duration) -> EngineResult<()> {
        self.send(Command::Play {
            handle,
            file: file.to_path_buf(),
            offset,
        })
    }

    fn pause(&mut self, handle: EngineHandle) -> EngineResult<()> {
        self.send(Command::Pause { handle })
    }

    fn stop(&mut self, handle: EngineHandle) {
        if let Err(e) = self.send(Command::Stop { handle }) {
            log::warn!("Could not stop engine {}: {}", handle, e);
        }
    }

    fn position(&self) -> Option<Duration> {
        match self.position.load(Ordering::Acquire) {
            NOT_PLAYING => None,
            millis => Some(Duration::from_millis(millis)),
        }
    }

    fn release(&mut self, handle: EngineHandle) {
        let sent = self.send(Command::Release { handle });
        self.released = true;
        if sent.is_err() {
            // Nobody left to confirm the release
            let _ = self.signals.send(Signal::Engine {
                handle,
                event: EngineEvent::Released,
            });
        }
    }
}

impl Drop for ThreadedEngine {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Engine worker panicked");
            }
        }
    }
}

/// The file currently being played
struct Playback {
    handle: EngineHandle,
    decoder: AudioDecoder,
    output: AudioOutput,
    processor: SpeedProcessor,
    /// Source time decoded so far, ahead of what has been heard
    decoded_ms: f64,
    pending: Option<TimedBlock>,
    exhausted: bool,
    last_progress: Instant,
}

struct Worker {
    commands: Receiver<Command>,
    signals: Sender<Signal>,
    position: Arc<AtomicU64>,
    progress_interval: StdDuration,
    speed: Speed,
    pitch_correction: bool,
    current: Option<Playback>,
}

impl Worker {
    fn run(mut self) {
        loop {
            let command = if self.current.is_some() {
                match self.commands.recv_timeout(POLL_INTERVAL) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            } else {
                match self.commands.recv() {
                    Ok(command) => Some(command),
                    Err(_) => break,
                }
            };

            if let Some(command) = command {
                if !self.handle(command) {
                    break;
                }
            }
            self.feed_output();
        }
        log::debug!("Engine worker exiting");
    }

    /// Returns false once the worker should exit
    fn handle(&mut self, command: Command) -> bool {
        log::trace!("Engine command: {:?}", command);
        match command {
            Command::Probe { handle, file } => {
                self.close();
                self.probe(handle, file);
            }
            Command::Play {
                handle,
                file,
                offset,
            } => {
                self.close();
                self.start(handle, &file, offset);
            }
            Command::Pause { handle } => {
                if let Some(playback) = self.current.take() {
                    playback.output.pause();
                    let heard = playback.output.played();
                    self.position.store(heard.as_millis(), Ordering::Release);
                    log::debug!("Engine {} paused at {}", handle, heard);
                }
            }
            Command::Stop { .. } => self.close(),
            Command::SetSpeed(speed) => {
                self.speed = speed;
                if let Some(playback) = self.current.as_mut() {
                    playback.processor.set_speed(speed);
                }
            }
            Command::SetPitchCorrection(enabled) => {
                self.pitch_correction = enabled;
                if let Some(playback) = self.current.as_mut() {
                    playback.processor.set_pitch_correction(enabled);
                }
            }
            Command::Release { handle } => {
                self.close();
                notify(&self.signals, handle, EngineEvent::Released);
                return false;
            }
            Command::Shutdown => {
                self.close();
                return false;
            }
        }
        true
    }

    fn close(&mut self) {
        self.current = None;
        self.position.store(NOT_PLAYING, Ordering::Release);
    }

    fn probe(&self, handle: EngineHandle, file: PathBuf) {
        let event = match AudioDecoder::new(&file).and_then(|mut d| d.measure_duration()) {
            Ok(duration) => {
                log::debug!("{} lasts {}", file.display(), duration);
                EngineEvent::DurationReady { file, duration }
            }
            Err(e) => EngineEvent::ProbeFailed {
                file,
                reason: e.to_string(),
            },
        };
        notify(&self.signals, handle, event);
    }

    fn start(&mut self, handle: EngineHandle, file: &Path, offset: Duration) {
        match self.open(handle, file, offset) {
            Ok(playback) => {
                let declared = playback.decoder.declared_duration();
                self.position
                    .store(playback.output.played().as_millis(), Ordering::Release);
                self.current = Some(playback);

                notify(&self.signals, handle, EngineEvent::PlaybackStarted);
                if let Some(duration) = declared {
                    notify(
                        &self.signals,
                        handle,
                        EngineEvent::DurationReady {
                            file: file.to_path_buf(),
                            duration,
                        },
                    );
                }
            }
            Err(e) => {
                log::error!("Failed to play {}: {}", file.display(), e);
                notify(
                    &self.signals,
                    handle,
                    EngineEvent::Error {
                        reason: e.to_string(),
                    },
                );
            }
        }
    }

    fn open(&self, handle: EngineHandle, file: &Path, offset: Duration) -> EngineResult<Playback> {
        let mut decoder = AudioDecoder::new(file)?;
        let resumed = decoder.seek(offset)?;
        let spec = *decoder.spec();
        let channels = spec.channels.count() as u16;

        let output = AudioOutput::open(spec.rate, channels, resumed)?;
        let mut processor = SpeedProcessor::new(channels);
        processor.set_speed(self.speed);
        processor.set_pitch_correction(self.pitch_correction);

        Ok(Playback {
            handle,
            decoder,
            output,
            processor,
            decoded_ms: resumed.as_millis() as f64,
            pending: None,
            exhausted: false,
            last_progress: Instant::now(),
        })
    }

    /// Decodes until the output queue is full, then reports progress or the
    /// end of the file
    fn feed_output(&mut self) {
        let Some(playback) = self.current.as_mut() else {
            return;
        };
        let handle = playback.handle;

        loop {
            if let Some(block) = playback.pending.take() {
                if let Err(block) = playback.output.try_queue(block) {
                    playback.pending = Some(block);
                    break;
                }
            }
            if playback.exhausted {
                break;
            }

            match playback.decoder.decode_next() {
                Ok(Some(decoded)) => {
                    let start_ms = playback.decoded_ms;
                    playback.decoded_ms +=
                        decoded.frames as f64 * 1000.0 / f64::from(decoded.spec.rate);
                    playback.pending = Some(TimedBlock {
                        samples: playback.processor.process(&decoded.samples),
                        start_ms,
                        end_ms: playback.decoded_ms,
                    });
                }
                Ok(None) => playback.exhausted = true,
                Err(e) => {
                    log::error!("Playback failed: {}", e);
                    self.current = None;
                    notify(
                        &self.signals,
                        handle,
                        EngineEvent::Error {
                            reason: e.to_string(),
                        },
                    );
                    return;
                }
            }
        }

        if playback.exhausted && playback.pending.is_none() && playback.output.is_drained() {
            self.current = None;
            notify(&self.signals, handle, EngineEvent::FileEnded);
            return;
        }

        let heard = playback.output.played();
        self.position.store(heard.as_millis(), Ordering::Release);

        if playback.last_progress.elapsed() >= self.progress_interval {
            playback.last_progress = Instant::now();
            notify(&self.signals, handle, EngineEvent::Progress { position: heard });
        }
    }
}

fn notify(signals: &Sender<Signal>, handle: EngineHandle, event: EngineEvent) {
    if signals.send(Signal::Engine { handle, event }).is_err() {
        log::debug!("No one is listening to engine {}", handle);
    }
}
