//! Integration tests for the playback orchestrator
//!
//! The engine is scripted: tests feed its callbacks by hand and inspect the
//! commands it received.

mod common;

use common::{book, builder, harness, ms, path, Call};
use earmark_config::PlayerConfig;
use earmark_core::{BookPosition, BookStore};
use earmark_media_engine::{
    EngineError, EngineEvent, FocusChange, PlaybackEvent, SessionState, Signal,
};

// ===== Starting and resuming =====

#[test]
fn test_resume_jumps_back_from_saved_offset() {
    let mut h = harness();
    let book = book(&[("01.mp3", Some(60_000)), ("02.mp3", Some(60_000))]);
    {
        let mut book = book.lock();
        book.advance_file();
        book.update_position(ms(4_000));
    }

    h.orchestrator.start_playback(book.clone()).unwrap();

    assert_eq!(h.plays(), vec![(path("02.mp3"), ms(2_000))]);
    assert_eq!(h.orchestrator.session_state(), Some(SessionState::Starting));
    assert!(h.trace.contains("focus.request"));
    assert!(h.trace.contains("notifier.show Test Book"));
}

#[test]
fn test_jump_back_clamps_at_start_of_file() {
    let mut h = harness();
    let book = book(&[("01.mp3", Some(60_000)), ("02.mp3", Some(60_000))]);
    {
        let mut book = book.lock();
        book.advance_file();
        book.update_position(ms(1_500));
    }

    h.orchestrator.start_playback(book).unwrap();

    // Never crosses into the previous file
    assert_eq!(h.plays(), vec![(path("02.mp3"), ms(0))]);
}

#[test]
fn test_configured_speed_and_jump_back_are_applied() {
    let config = PlayerConfig {
        jump_back_ms: 5_000,
        playback_speed: 1.5,
        ..Default::default()
    };
    let mut h = builder().config(config).build();
    let book = book(&[("01.mp3", Some(60_000))]);
    book.lock().update_position(ms(20_000));

    h.orchestrator.start_playback(book).unwrap();

    let calls = h.log.calls();
    assert_eq!(calls[0], Call::Speed(1.5));
    assert!(matches!(&calls[1], Call::Play(_, file, offset) if *file == path("01.mp3") && *offset == ms(15_000)));
}

#[test]
fn test_start_while_active_is_rejected() {
    let mut h = harness();
    let book = book(&[("01.mp3", Some(60_000))]);
    h.orchestrator.start_playback(book.clone()).unwrap();

    let result = h.orchestrator.start_playback(book);
    assert!(matches!(result, Err(EngineError::Precondition(_))));
    assert_eq!(h.plays().len(), 1);
}

#[test]
fn test_factory_failure_gives_focus_back() {
    let mut h = builder().failing_factory().build();
    let result = h.orchestrator.start_playback(book(&[("01.mp3", Some(1_000))]));

    assert!(matches!(result, Err(EngineError::OutputError(_))));
    assert!(!h.orchestrator.is_in_playback_mode());
    assert_eq!(
        h.trace.entries(),
        vec!["focus.request".to_string(), "focus.abandon".to_string()]
    );
}

// ===== Duration probing =====

#[test]
fn test_unknown_durations_are_probed_before_playing() {
    let mut h = harness();
    let book = book(&[("a.mp3", None), ("b.mp3", Some(1_000)), ("c.mp3", None)]);

    h.orchestrator.start_playback(book.clone()).unwrap();
    assert!(h.orchestrator.is_probing());
    let probe_handle = h.log.last_handle();

    h.engine_event(EngineEvent::DurationReady {
        file: path("a.mp3"),
        duration: ms(5_000),
    });
    h.engine_event(EngineEvent::DurationReady {
        file: path("c.mp3"),
        duration: ms(3_000),
    });

    let calls = h.log.calls();
    assert_eq!(
        calls[1..3],
        [
            Call::Probe(probe_handle, path("a.mp3")),
            Call::Probe(probe_handle, path("c.mp3")),
        ]
    );
    match &calls[3] {
        Call::Play(handle, file, offset) => {
            assert_ne!(*handle, probe_handle);
            assert_eq!(*file, path("a.mp3"));
            assert_eq!(*offset, ms(0));
        }
        other => panic!("expected playback to start, got {:?}", other),
    }

    assert!(!h.orchestrator.is_probing());
    assert_eq!(book.lock().total_duration(), Some(ms(9_000)));
}

#[test]
fn test_unprobeable_file_does_not_block_playback() {
    let mut h = harness();
    let book = book(&[("a.mp3", None), ("b.mp3", None)]);

    h.orchestrator.start_playback(book.clone()).unwrap();
    h.engine_event(EngineEvent::ProbeFailed {
        file: path("a.mp3"),
        reason: "unsupported codec".to_string(),
    });
    h.engine_event(EngineEvent::DurationReady {
        file: path("b.mp3"),
        duration: ms(2_000),
    });

    assert_eq!(h.plays(), vec![(path("a.mp3"), ms(0))]);
    assert_eq!(book.lock().files()[0].duration(), None);
}

#[test]
fn test_stale_callbacks_are_ignored() {
    let mut h = harness();
    let book = book(&[("a.mp3", None), ("b.mp3", Some(10_000))]);

    h.orchestrator.start_playback(book.clone()).unwrap();
    let probe_handle = h.log.last_handle();
    h.engine_event(EngineEvent::DurationReady {
        file: path("a.mp3"),
        duration: ms(10_000),
    });
    let calls_before = h.log.calls().len();

    // The probe controller is gone; nothing it reports may move the session
    h.engine_event_for(probe_handle, EngineEvent::PlaybackStarted);
    h.engine_event_for(probe_handle, EngineEvent::Progress { position: ms(9_000) });
    h.engine_event_for(probe_handle, EngineEvent::FileEnded);
    h.engine_event_for(probe_handle, EngineEvent::Released);

    assert_eq!(h.orchestrator.session_state(), Some(SessionState::Starting));
    assert_eq!(h.log.calls().len(), calls_before);
    assert_eq!(book.lock().position(), BookPosition::default());
    assert!(h.orchestrator.is_in_playback_mode());
}

// ===== Progress and file transitions =====

#[test]
fn test_progress_is_published_as_total_elapsed() {
    let mut h = harness();
    let book = book(&[("01.mp3", Some(60_000)), ("02.mp3", Some(60_000))]);
    book.lock().advance_file();

    h.start_playing(&book);
    h.engine_event(EngineEvent::Progress { position: ms(2_500) });

    let book_id = book.id();
    assert_eq!(
        h.drain_events(),
        vec![PlaybackEvent::Progressed {
            book_id,
            elapsed: ms(62_500),
        }]
    );

    let saved = h.store.load(&book_id).unwrap().unwrap();
    assert_eq!(saved.position(), BookPosition::new(1, ms(2_500)));
}

#[test]
fn test_progress_before_playback_started_is_discarded() {
    let mut h = harness();
    let book = book(&[("01.mp3", Some(60_000))]);

    h.orchestrator.start_playback(book.clone()).unwrap();
    h.engine_event(EngineEvent::Progress { position: ms(5_000) });

    assert!(h.drain_events().is_empty());
    assert_eq!(book.lock().position(), BookPosition::default());
}

#[test]
fn test_file_end_continues_with_next_file() {
    let mut h = harness();
    let book = book(&[("01.mp3", Some(1_000)), ("02.mp3", Some(1_000))]);

    h.start_playing(&book);
    h.engine_event(EngineEvent::FileEnded);

    assert_eq!(
        h.plays(),
        vec![(path("01.mp3"), ms(0)), (path("02.mp3"), ms(0))]
    );
    assert_eq!(h.orchestrator.session_state(), Some(SessionState::Advancing));
    assert_eq!(book.lock().position(), BookPosition::new(1, ms(0)));

    h.engine_event(EngineEvent::PlaybackStarted);
    assert_eq!(h.orchestrator.session_state(), Some(SessionState::Playing));
}

#[test]
fn test_end_of_book_stops_exactly_once() {
    let mut h = harness();
    let book = book(&[("01.mp3", Some(1_000)), ("02.mp3", Some(1_000))]);
    book.lock().advance_file();

    h.start_playing(&book);
    h.engine_event(EngineEvent::Progress { position: ms(900) });
    h.drain_events();

    h.engine_event(EngineEvent::FileEnded);
    assert_eq!(h.drain_events(), vec![PlaybackEvent::Stopping]);
    assert!(matches!(h.log.calls().last(), Some(Call::Release(_))));

    // Release is confirmed asynchronously
    assert!(h.orchestrator.is_in_playback_mode());
    h.orchestrator.pump();
    assert_eq!(h.drain_events(), vec![PlaybackEvent::Stopped]);
    assert!(!h.orchestrator.is_in_playback_mode());

    h.orchestrator.stop_playback();
    h.orchestrator.pump();
    assert!(h.drain_events().is_empty());

    let saved = h.store.load(&book.id()).unwrap().unwrap();
    assert_eq!(saved.position(), BookPosition::default());
    assert_eq!(h.trace.count("notifier.hide"), 1);
}

// ===== Rewind =====

#[test]
fn test_rewind_restarts_in_earlier_file() {
    let mut h = harness();
    let book = book(&[("01.mp3", Some(60_000)), ("02.mp3", Some(60_000))]);
    book.lock().advance_file();

    h.start_playing(&book);
    h.log.set_position(Some(ms(30_000)));

    h.orchestrator.pause_for_rewind().unwrap();
    assert_eq!(h.orchestrator.session_state(), Some(SessionState::PausedForRewind));
    assert_eq!(book.lock().position(), BookPosition::new(1, ms(30_000)));
    assert!(matches!(h.log.calls().last(), Some(Call::Pause(_))));

    h.orchestrator.resume_from_rewind(ms(10_000)).unwrap();
    assert_eq!(h.orchestrator.session_state(), Some(SessionState::Starting));
    assert_eq!(h.plays().last(), Some(&(path("01.mp3"), ms(10_000))));
    assert_eq!(book.lock().position(), BookPosition::new(0, ms(10_000)));
}

#[test]
fn test_rewind_calls_require_the_right_state() {
    let mut h = harness();
    assert!(matches!(
        h.orchestrator.pause_for_rewind(),
        Err(EngineError::Precondition(_))
    ));
    assert!(matches!(
        h.orchestrator.resume_from_rewind(ms(0)),
        Err(EngineError::Precondition(_))
    ));

    let book = book(&[("01.mp3", Some(60_000))]);
    h.orchestrator.start_playback(book.clone()).unwrap();
    // Not confirmed as playing yet
    assert!(h.orchestrator.pause_for_rewind().is_err());

    h.engine_event(EngineEvent::PlaybackStarted);
    assert!(matches!(
        h.orchestrator.resume_from_rewind(ms(0)),
        Err(EngineError::Precondition(_))
    ));
    assert_eq!(h.orchestrator.session_state(), Some(SessionState::Playing));
}

#[test]
fn test_rewind_while_probing_is_rejected() {
    let mut h = harness();
    h.orchestrator
        .start_playback(book(&[("a.mp3", None)]))
        .unwrap();

    assert!(matches!(
        h.orchestrator.pause_for_rewind(),
        Err(EngineError::Precondition(_))
    ));
    assert!(h.orchestrator.is_probing());
}

#[test]
fn test_refused_restart_after_rewind_stops_playback() {
    let mut h = harness();
    let book = book(&[("01.mp3", Some(60_000)), ("02.mp3", Some(60_000))]);
    book.lock().advance_file();
    h.start_playing(&book);
    h.log.set_position(Some(ms(30_000)));
    h.orchestrator.pause_for_rewind().unwrap();

    h.log.refuse_next_play();
    let result = h.orchestrator.resume_from_rewind(ms(10_000));

    assert!(matches!(result, Err(EngineError::InvalidState(_))));
    assert_eq!(h.orchestrator.session_state(), None);
    assert_eq!(h.drain_events(), vec![PlaybackEvent::Stopping]);
    assert_eq!(h.orchestrator.pump(), 1);
    assert_eq!(h.drain_events(), vec![PlaybackEvent::Stopped]);
    assert!(!h.orchestrator.is_in_playback_mode());
    assert_eq!(h.trace.count("focus.abandon"), 1);

    // The chosen target is kept for the next session
    let saved = h.store.load(&book.id()).unwrap().unwrap();
    assert_eq!(saved.position(), BookPosition::new(0, ms(10_000)));
}

// ===== Stopping =====

#[test]
fn test_stop_emits_stopping_then_stopped() {
    let mut h = harness();
    let book = book(&[("01.mp3", Some(60_000))]);
    h.start_playing(&book);

    h.orchestrator.stop_playback();
    h.orchestrator.stop_playback();
    assert_eq!(h.drain_events(), vec![PlaybackEvent::Stopping]);

    // A new session must wait for the release
    assert!(h.orchestrator.start_playback(book.clone()).is_err());

    assert_eq!(h.orchestrator.pump(), 1);
    assert_eq!(h.drain_events(), vec![PlaybackEvent::Stopped]);
    assert!(h.orchestrator.start_playback(book).is_ok());
}

#[test]
fn test_stop_while_probing_releases_engine() {
    let mut h = harness();
    h.orchestrator
        .start_playback(book(&[("a.mp3", None), ("b.mp3", None)]))
        .unwrap();

    h.orchestrator.stop_playback();
    h.orchestrator.pump();

    let calls = h.log.calls();
    assert!(matches!(calls[calls.len() - 2], Call::Stop(_)));
    assert!(matches!(calls[calls.len() - 1], Call::Release(_)));
    assert_eq!(
        h.drain_events(),
        vec![PlaybackEvent::Stopping, PlaybackEvent::Stopped]
    );
    assert!(h.plays().is_empty());
}

#[test]
fn test_engine_error_stops_playback() {
    let mut h = harness();
    h.start_playing(&book(&[("01.mp3", Some(60_000))]));

    h.engine_event(EngineEvent::Error {
        reason: "device unplugged".to_string(),
    });
    h.orchestrator.pump();

    assert_eq!(
        h.drain_events(),
        vec![PlaybackEvent::Stopping, PlaybackEvent::Stopped]
    );
    assert!(h.trace.contains("focus.abandon"));
}

#[test]
fn test_engine_released_mid_probe_never_starts_session() {
    let mut h = harness();
    let book = book(&[("a.mp3", None), ("b.mp3", None)]);
    h.orchestrator.start_playback(book.clone()).unwrap();
    let probe_handle = h.log.last_handle();

    h.engine_event_for(probe_handle, EngineEvent::Released);
    h.engine_event_for(
        probe_handle,
        EngineEvent::DurationReady {
            file: path("a.mp3"),
            duration: ms(5_000),
        },
    );
    h.engine_event_for(probe_handle, EngineEvent::Released);

    assert_eq!(
        h.drain_events(),
        vec![PlaybackEvent::Stopping, PlaybackEvent::Stopped]
    );
    assert!(h.plays().is_empty());
    assert!(!h.orchestrator.is_probing());
    assert!(!h.orchestrator.is_in_playback_mode());
    assert_eq!(book.lock().files()[0].duration(), None);
    assert_eq!(h.trace.count("notifier.hide"), 1);
}

#[test]
fn test_engine_released_while_playing_keeps_last_progress() {
    let mut h = harness();
    let book = book(&[("01.mp3", Some(60_000))]);
    h.start_playing(&book);
    h.engine_event(EngineEvent::Progress { position: ms(7_000) });
    h.drain_events();
    let calls_before = h.log.calls().len();

    // The engine can no longer be asked where it got to
    h.log.set_position(Some(ms(30_000)));
    h.engine_event(EngineEvent::Released);

    assert_eq!(
        h.drain_events(),
        vec![PlaybackEvent::Stopping, PlaybackEvent::Stopped]
    );
    assert_eq!(h.log.calls().len(), calls_before);
    assert_eq!(book.lock().position(), BookPosition::new(0, ms(7_000)));
    assert_eq!(h.trace.count("notifier.hide"), 1);
    assert_eq!(h.trace.count("focus.abandon"), 1);
}

#[test]
fn test_only_lasting_focus_loss_stops_playback() {
    let mut h = harness();
    h.start_playing(&book(&[("01.mp3", Some(60_000))]));

    h.orchestrator
        .dispatch(Signal::AudioFocus(FocusChange::LossTransientCanDuck));
    h.orchestrator.dispatch(Signal::AudioFocus(FocusChange::Gain));
    assert!(h.drain_events().is_empty());
    assert_eq!(h.orchestrator.session_state(), Some(SessionState::Playing));

    h.orchestrator
        .dispatch(Signal::AudioFocus(FocusChange::LossTransient));
    assert_eq!(h.drain_events(), vec![PlaybackEvent::Stopping]);
}

#[test]
fn test_face_down_stops_and_disables_gestures() {
    let mut h = harness();
    h.start_playing(&book(&[("01.mp3", Some(60_000))]));
    assert!(h.trace.contains("gestures.enable"));

    h.orchestrator.signal_sender().send(Signal::FaceDown).unwrap();
    h.orchestrator.pump();
    h.orchestrator.pump();

    assert!(h.trace.contains("gestures.disable"));
    assert_eq!(
        h.drain_events(),
        vec![PlaybackEvent::Stopping, PlaybackEvent::Stopped]
    );
}

#[test]
fn test_gestures_stay_off_when_disabled_in_settings() {
    let config = PlayerConfig {
        stop_on_face_down: false,
        ..Default::default()
    };
    let mut h = builder().config(config).build();
    h.start_playing(&book(&[("01.mp3", Some(60_000))]));
    h.orchestrator.stop_playback();

    assert!(!h.trace.contains("gestures.enable"));
    assert!(!h.trace.contains("gestures.disable"));
}

#[test]
fn test_missing_gesture_detector_is_tolerated() {
    let mut h = builder().without_gestures().build();
    h.start_playing(&book(&[("01.mp3", Some(60_000))]));
    h.orchestrator.dispatch(Signal::FaceDown);

    assert_eq!(h.drain_events(), vec![PlaybackEvent::Stopping]);
}

// ===== Elapsed time sync =====

#[test]
fn test_elapsed_time_sync_reads_engine_position() {
    let mut h = harness();
    let book = book(&[("01.mp3", Some(60_000)), ("02.mp3", Some(60_000))]);
    book.lock().advance_file();

    h.orchestrator.request_elapsed_time_sync();
    assert!(h.drain_events().is_empty());

    h.start_playing(&book);
    h.log.set_position(Some(ms(7_000)));
    h.orchestrator.request_elapsed_time_sync();

    assert_eq!(
        h.drain_events(),
        vec![PlaybackEvent::Progressed {
            book_id: book.id(),
            elapsed: ms(67_000),
        }]
    );
}

#[test]
fn test_position_survives_in_store() {
    let mut h = harness();
    let book = book(&[("01.mp3", Some(60_000))]);

    h.start_playing(&book);
    h.engine_event(EngineEvent::Progress { position: ms(12_000) });
    assert_eq!(
        h.store.load(&book.id()).unwrap().unwrap().position(),
        BookPosition::new(0, ms(12_000))
    );

    // Stopping records the engine's offset, which is ahead of the last report
    h.log.set_position(Some(ms(12_400)));
    h.orchestrator.stop_playback();
    h.orchestrator.pump();

    let saved = h.store.load(&book.id()).unwrap().unwrap();
    assert_eq!(saved.position(), BookPosition::new(0, ms(12_400)));
    assert!(h.store.save_count() >= 1);
    assert!(h.orchestrator.book().is_none());
}
