use crate::commands;
use anyhow::{Context, Result};
use console::{style, Key, Term};
use crossbeam_channel::{never, select, unbounded, Receiver};
use earmark_config::{Config, ConfigManager};
use earmark_core::{Duration, JsonBookStore, SharedBook};
use earmark_media_engine::{
    Collaborators, LogNotifier, PlaybackEvent, PlaybackOrchestrator, SessionState,
    ThreadedEngineFactory, UnmanagedFocus,
};
use std::path::Path;
use std::thread;
use std::time::Duration as StdDuration;

const SEEK_STEP: Duration = Duration::from_seconds(10);
const REFRESH_INTERVAL: StdDuration = StdDuration::from_millis(500);

pub fn play_book(dir: &Path, config: &Config, manager: &ConfigManager) -> Result<()> {
    let store = JsonBookStore::new(manager.positions_dir(config));
    let book = SharedBook::new(commands::open_book(dir, &store)?);

    let collaborators = Collaborators {
        settings: Box::new(config.player.clone()),
        focus: Box::new(UnmanagedFocus),
        gestures: None,
        notifier: Box::new(LogNotifier),
        store: Box::new(store),
    };
    let factory = ThreadedEngineFactory::from_config(&config.player);
    let mut orchestrator = PlaybackOrchestrator::new(Box::new(factory), collaborators);
    let events = orchestrator.subscribe();

    orchestrator
        .start_playback(book.clone())
        .context("Failed to start playback")?;

    let term = Term::stdout();
    if term.hide_cursor().is_err() {
        log::debug!("Terminal does not support hiding the cursor");
    }

    let mut view = PlayerView::new(book);
    let result = run_loop(&term, &mut orchestrator, &mut view, &events);

    let _ = term.show_cursor();
    println!();
    result
}

fn run_loop(
    term: &Term,
    orchestrator: &mut PlaybackOrchestrator,
    view: &mut PlayerView,
    events: &Receiver<PlaybackEvent>,
) -> Result<()> {
    let signals = orchestrator.signals();
    let mut keys = spawn_key_reader();

    loop {
        view.draw(term, orchestrator.session_state())?;
        let mut keys_closed = false;

        select! {
            recv(signals) -> signal => {
                if let Ok(signal) = signal {
                    orchestrator.dispatch(signal);
                }
            }
            recv(events) -> event => match event {
                Ok(PlaybackEvent::Progressed { elapsed, .. }) => view.elapsed = elapsed,
                Ok(PlaybackEvent::Stopping) => view.stopping = true,
                Ok(PlaybackEvent::Stopped) | Err(_) => return Ok(()),
            },
            recv(keys) -> key => match key {
                Ok(key) => {
                    if !handle_key(orchestrator, view, key) {
                        return Ok(());
                    }
                }
                // Not a terminal; keep playing without controls
                Err(_) => keys_closed = true,
            },
            default(REFRESH_INTERVAL) => orchestrator.request_elapsed_time_sync(),
        }

        if keys_closed {
            keys = never();
        }
    }
}

/// Returns false when the player should exit right away
fn handle_key(orchestrator: &mut PlaybackOrchestrator, view: &mut PlayerView, key: Key) -> bool {
    match (key, orchestrator.session_state()) {
        (Key::Char(' '), Some(SessionState::Playing)) => {
            match orchestrator.pause_for_rewind() {
                Ok(()) => view.rewind_target = Some(view.current_elapsed()),
                Err(e) => log::warn!("Could not pause: {}", e),
            }
        }
        (Key::Char(' '), Some(SessionState::PausedForRewind)) => {
            let target = view.rewind_target.take().unwrap_or(view.elapsed);
            match orchestrator.resume_from_rewind(target) {
                Ok(()) => view.elapsed = target,
                Err(e) => {
                    log::warn!("Could not resume at {}: {}", target, e);
                    view.rewind_target = Some(target);
                }
            }
        }
        (Key::ArrowLeft, Some(SessionState::PausedForRewind)) => view.step_target(false),
        (Key::ArrowRight, Some(SessionState::PausedForRewind)) => view.step_target(true),
        (Key::Char('s'), _) | (Key::Char('q'), _) | (Key::Escape, _) => {
            orchestrator.stop_playback();
            return orchestrator.is_in_playback_mode();
        }
        _ => {}
    }
    true
}

fn spawn_key_reader() -> Receiver<Key> {
    let (tx, rx) = unbounded();
    let spawned = thread::Builder::new()
        .name("earmark-keys".to_string())
        .spawn(move || {
            let term = Term::stdout();
            while let Ok(key) = term.read_key() {
                if tx.send(key).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        log::warn!("Keyboard controls unavailable: {}", e);
    }
    rx
}

struct PlayerView {
    book: SharedBook,
    title: String,
    elapsed: Duration,
    rewind_target: Option<Duration>,
    stopping: bool,
}

impl PlayerView {
    fn new(book: SharedBook) -> Self {
        let (title, elapsed) = {
            let book = book.lock();
            (
                book.title().to_string(),
                book.elapsed().unwrap_or(Duration::ZERO),
            )
        };
        Self {
            book,
            title,
            elapsed,
            rewind_target: None,
            stopping: false,
        }
    }

    /// Listened time as the book currently records it
    fn current_elapsed(&self) -> Duration {
        self.book.lock().elapsed().unwrap_or(self.elapsed)
    }

    fn step_target(&mut self, forward: bool) {
        let current = self.rewind_target.unwrap_or(self.elapsed);
        let total = self.book.lock().total_duration();
        self.rewind_target = Some(step(current, forward, total));
    }

    fn draw(&self, term: &Term, state: Option<SessionState>) -> Result<()> {
        let status = match (self.stopping, state) {
            (true, _) => style("Stopping").red(),
            (_, Some(SessionState::Playing)) => style("Playing").green(),
            (_, Some(SessionState::PausedForRewind)) => style("Rewind").yellow(),
            (_, Some(_)) => style("Loading").dim(),
            (_, None) => style("Measuring").dim(),
        };
        let shown = self.rewind_target.unwrap_or(self.elapsed);
        let total = self
            .book
            .lock()
            .total_duration()
            .map(|d| d.as_hms())
            .unwrap_or_else(|| "--:--:--".to_string());
        let hint = if self.rewind_target.is_some() {
            "←/→ ±10s  space resume  q quit"
        } else {
            "space rewind  q quit"
        };

        term.clear_line().context("Failed to clear line")?;
        term.write_str(&format!(
            "{}  {}  {} / {}  {}",
            style(&self.title).bold().cyan(),
            status,
            shown.as_hms(),
            total,
            style(hint).dim()
        ))
        .context("Failed to write status")?;
        Ok(())
    }
}

/// Moves a rewind target by one step, staying within the book
fn step(current: Duration, forward: bool, total: Option<Duration>) -> Duration {
    if forward {
        let target = current.saturating_add(SEEK_STEP);
        match total {
            Some(total) => target.min(total),
            None => target,
        }
    } else {
        current.saturating_sub(SEEK_STEP)
    }
}
