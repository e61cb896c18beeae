//! Audio track controller integration tests
//!
//! Drives an `AudioTrack` against the simulated output graph. Loads are
//! completed synchronously except in the async tests, which run the real
//! `spawn_audio_load` path on a `LocalSet`.

mod helpers;

use std::rc::Rc;

use futures::FutureExt;
use helpers::*;
use tokio::sync::oneshot;
use tokio::task::LocalSet;
use tsync_common::config::TomlConfig;
use tsync_common::events::{ContentState, TrackId};
use tsync_tracks::device::{AudioStation, ContextState};
use tsync_tracks::intent::IntentEvent;
use tsync_tracks::track::{spawn_audio_load, AudioLoad};
use tsync_tracks::{AudioTrack, RecordingReporter, Track, TrackState};

// ============================================================================
// Clock tracking
// ============================================================================

/// **Given:** A loaded, playing track
/// **When:** `sync(1000, t0)` is followed 50ms later by `update(t0+50, 1050)`
/// **Then:** No corrective seek is issued and the track's own clock reads 1050
#[test]
fn test_sync_then_update_within_tolerance_does_not_reseek() {
    let rig = AudioRig::loaded(30.0);
    rig.play();
    let t0 = rig.now();
    rig.sync(1_000.0, t0);
    let seeks_after_sync = rig.element().seeks().len();

    rig.tick(50.0);
    assert!(!rig.update(t0 + 50.0, 1_050.0));

    assert_eq!(rig.element().seeks().len(), seeks_after_sync);
    let sample = rig.track.borrow_mut().check().expect("clock sample");
    assert!(approx_eq(sample.progress, 1_050.0, 1.0), "{:?}", sample);
    assert_eq!(sample.time, t0 + 50.0);
}

/// **Given:** A playing track whose element runs slow
/// **When:** Drift against the scheduler exceeds the tolerance
/// **Then:** The element is re-seeked to the scheduler target and the resync logged
#[test]
fn test_drift_beyond_tolerance_resyncs() {
    let rig = AudioRig::loaded(30.0);
    rig.play();
    let t0 = rig.now();
    rig.sync(0.0, t0);

    rig.clock.advance(100.0);
    rig.station.advance(40.0);
    rig.update(t0 + 100.0, 100.0);

    let last_seek = *rig.element().seeks().last().unwrap();
    assert!(approx_eq(last_seek, 0.1, 1e-9), "seek {}", last_seek);
    assert_eq!(logs_containing(&rig.reporter, "Resync"), 1);
}

/// **Given:** A playing track with small drift
/// **When:** Drift stays under the tolerance
/// **Then:** No resync happens
#[test]
fn test_small_drift_is_tolerated() {
    let rig = AudioRig::loaded(30.0);
    rig.play();
    let t0 = rig.now();
    rig.sync(0.0, t0);
    let seeks = rig.element().seeks().len();

    rig.clock.advance(100.0);
    rig.station.advance(80.0);
    rig.update(t0 + 100.0, 100.0);

    assert_eq!(rig.element().seeks().len(), seeks);
    assert_eq!(logs_containing(&rig.reporter, "Resync"), 0);
}

/// **Given:** A loaded track
/// **When:** A sync targets a position past the clip
/// **Then:** `finish_itself` fires once and the element is not seeked there
#[test]
fn test_sync_beyond_clip_finishes_once() {
    let rig = AudioRig::loaded(5.0);
    let seeks = rig.element().seeks().len();
    let now = rig.now();

    rig.sync(6_000.0, now);
    rig.sync(7_000.0, now);

    assert_eq!(rig.reporter.count(is_finished), 1);
    assert_eq!(rig.element().seeks().len(), seeks);
}

/// **Given:** A playing track that already signalled end of clip
/// **When:** The scheduler keeps ticking with targets past the clip
/// **Then:** No resync is attempted or logged
#[test]
fn test_finished_track_does_not_resync_past_clip() {
    let rig = AudioRig::loaded(5.0);
    rig.play();
    let t0 = rig.now();
    rig.sync(6_000.0, t0);
    let seeks = rig.element().seeks().len();

    for step in 1..=3 {
        rig.tick(100.0);
        rig.update(rig.now(), 6_000.0 + 100.0 * step as f64);
    }

    assert_eq!(logs_containing(&rig.reporter, "Resync"), 0);
    assert_eq!(rig.reporter.count(is_finished), 1);
    assert_eq!(rig.element().seeks().len(), seeks);
}

/// **Given:** A track whose context is suspended
/// **When:** The track's own clock is checked
/// **Then:** No sample is available
#[test]
fn test_check_unavailable_while_context_suspended() {
    let rig = AudioRig::loaded(30.0);
    assert!(rig.track.borrow_mut().check().is_some());

    rig.station.set_context_state(ContextState::Suspended);
    assert!(rig.track.borrow_mut().check().is_none());

    let empty = AudioRig::new();
    assert!(empty.track.borrow_mut().check().is_none());
}

// ============================================================================
// Play intent
// ============================================================================

/// **Given:** Any sequence of four play/pause/suspend/resume controls
/// **When:** The sequence is applied to a loaded track
/// **Then:** The track is audible exactly when `playing && !suspended`
#[test]
fn test_audibility_converges_to_intent() {
    let events = [
        IntentEvent::Play,
        IntentEvent::Pause,
        IntentEvent::Suspend,
        IntentEvent::Resume,
    ];
    for a in events {
        for b in events {
            for c in events {
                for d in events {
                    let rig = AudioRig::loaded(30.0);
                    for event in [a, b, c, d] {
                        let mut track = rig.track.borrow_mut();
                        match event {
                            IntentEvent::Play => track.play(),
                            IntentEvent::Pause => track.pause(),
                            IntentEvent::Suspend => track.suspend(),
                            IntentEvent::Resume => track.resume(),
                        }
                    }
                    let should_play = rig.track.borrow().intent().should_play();
                    assert_eq!(rig.audible(), should_play, "sequence {:?}", [a, b, c, d]);
                }
            }
        }
    }
}

/// **Given:** A playing track
/// **When:** `pause()` is immediately followed by `play()`
/// **Then:** Both report the same progress
#[test]
fn test_pause_play_round_trip_keeps_progress() {
    let rig = AudioRig::loaded(30.0);
    rig.play();
    rig.tick(100.0);

    rig.pause();
    let paused_at = rig.reporter.last_progress().unwrap();
    rig.play();
    let resumed_at = rig.reporter.last_progress().unwrap();

    assert_eq!(paused_at, resumed_at);
    assert!(approx_eq(paused_at, 100.0, 1e-6));
}

/// **Given:** A track with nothing loaded and no scheduler sample
/// **When:** It is played and paused after time has passed
/// **Then:** Progress stays at zero
#[test]
fn test_progress_before_any_load_stays_at_zero() {
    let rig = AudioRig::new();
    rig.tick(500.0);
    rig.play();
    rig.tick(400.0);
    rig.pause();

    assert_eq!(rig.reporter.progress_reports(), vec![0.0, 0.0]);
}

/// **Given:** A playing element whose reported time lags the clock
/// **When:** The track is paused
/// **Then:** The element is pinned at the extrapolated position, never behind
#[test]
fn test_pause_pins_element_forward() {
    let rig = AudioRig::loaded(30.0);
    rig.play();
    rig.clock.advance(100.0);

    rig.pause();

    assert!(!rig.element().is_playing());
    assert!(approx_eq(rig.element().time(), 0.1, 1e-9));
}

/// **Given:** A playing track
/// **When:** It is suspended and resumed
/// **Then:** Only the mixer is suspended; the element keeps its play state
#[test]
fn test_suspend_acts_on_mixer() {
    let rig = AudioRig::loaded(30.0);
    rig.play();

    rig.track.borrow_mut().suspend();
    assert_eq!(rig.station.mixer_suspended(0), Some(true));
    assert!(rig.element().is_playing());
    assert_eq!(rig.track.borrow().state(), TrackState::Suspended);

    rig.track.borrow_mut().resume();
    assert_eq!(rig.station.mixer_suspended(0), Some(false));
    assert_eq!(rig.track.borrow().state(), TrackState::Playing);
}

/// **Given:** A playing track
/// **When:** The element stops behind the track's back
/// **Then:** The next update restarts it
#[test]
fn test_update_restarts_externally_paused_element() {
    let rig = AudioRig::loaded(30.0);
    rig.play();
    rig.element().external_pause();

    rig.tick(16.0);
    rig.update(rig.now(), 16.0);

    assert!(rig.element().is_playing());
}

// ============================================================================
// Stuck detection
// ============================================================================

/// **Given:** A load in flight and no element yet
/// **When:** The update loop runs, then the load completes
/// **Then:** Stuck and unstuck are each reported once
#[test]
fn test_pending_load_is_stuck_until_loaded() {
    let rig = AudioRig::new();
    let ticket = rig.track.borrow_mut().begin_load().unwrap();
    assert_eq!(rig.track.borrow().state(), TrackState::AttachedNotReady);

    assert!(rig.update(rig.now(), 0.0));
    rig.tick(16.0);
    assert!(rig.update(rig.now(), 16.0));
    assert_eq!(rig.reporter.count(is_stuck), 1);
    assert_eq!(logs_containing(&rig.reporter, "not-loaded"), 1);

    let source = rig.station.source("clip.ogg", 30.0);
    rig.track.borrow_mut().finish_load(ticket, Some(source));
    rig.tick(16.0);
    assert!(!rig.update(rig.now(), 32.0));
    assert_eq!(rig.reporter.count(is_unstuck), 1);
}

/// **Given:** A loaded track
/// **When:** The element reports it cannot make progress
/// **Then:** The track is stuck with the device-stalled reason
#[test]
fn test_stalled_element_is_stuck() {
    let rig = AudioRig::loaded(30.0);
    rig.element().set_stuck(true);

    assert!(rig.update(rig.now(), 0.0));
    assert_eq!(logs_containing(&rig.reporter, "device-stalled"), 1);
    assert_eq!(rig.track.borrow().state(), TrackState::Stuck);
}

/// **Given:** An output context the platform suspended silently
/// **When:** The update loop runs
/// **Then:** The track asks the context to resume, unless configured not to
#[test]
fn test_update_resumes_suspended_context() {
    let rig = AudioRig::loaded(30.0);
    rig.station.set_context_state(ContextState::Suspended);
    rig.update(rig.now(), 0.0);
    assert_eq!(rig.station.resume_requests(), 1);
    assert_eq!(rig.station.context_state(), ContextState::Running);

    let mut config = TomlConfig::default();
    config.recovery.resume_suspended_audio_context = false;
    let station = tsync_tracks::sim::SimAudioStation::new();
    let mut track = AudioTrack::from_config(
        TrackId::from("quiet"),
        Rc::new(station.clone()),
        Rc::new(RecordingReporter::new(TrackId::from("quiet"))),
        Rc::new(rig.clock.clone()),
        &config,
    );
    station.set_context_state(ContextState::Suspended);
    track.update(rig.now(), 0.0);
    assert_eq!(station.resume_requests(), 0);
}

// ============================================================================
// Loads
// ============================================================================

/// **Given:** Two loads started back to back
/// **When:** The older one completes first, then the newer one
/// **Then:** Only the newer result reaches the device; the older is released
#[test]
fn test_superseded_load_is_released() {
    let rig = AudioRig::new();
    rig.play();
    let first = rig.track.borrow_mut().begin_load().unwrap();
    let second = rig.track.borrow_mut().begin_load().unwrap();
    let progress_reports = rig.reporter.count(is_progress);

    let stale = rig.station.source("old.ogg", 30.0);
    rig.track.borrow_mut().finish_load(first, Some(stale));
    assert_eq!(rig.station.released_sources(), 1);
    assert_eq!(rig.station.elements_created(), 0);

    let fresh = rig.station.source("new.ogg", 30.0);
    rig.track.borrow_mut().finish_load(second, Some(fresh));
    assert_eq!(rig.station.elements_created(), 1);
    assert_eq!(rig.element().url(), "new.ogg");
    assert!(rig.element().is_playing());
    assert_eq!(rig.reporter.count(is_progress), progress_reports);
}

/// **Given:** A track with a clip loaded
/// **When:** The same url is loaded again
/// **Then:** The duplicate is released and the element kept
#[test]
fn test_same_url_keeps_element() {
    let rig = AudioRig::loaded(30.0);
    rig.load("clip.ogg", 30.0);

    assert_eq!(rig.station.elements_created(), 1);
    assert_eq!(rig.station.released_sources(), 1);
    assert!(!rig.element().is_dropped());
}

/// **Given:** A track with a clip loaded
/// **When:** A load completes with nothing
/// **Then:** The element is unloaded
#[test]
fn test_empty_load_unloads() {
    let rig = AudioRig::loaded(30.0);
    let ticket = rig.track.borrow_mut().begin_load().unwrap();
    rig.track.borrow_mut().finish_load(ticket, None);

    assert!(rig.element().is_dropped());
    assert_eq!(rig.track.borrow().state(), TrackState::Unattached);
}

/// **Given:** A playing track whose load takes 500ms
/// **When:** The load completes
/// **Then:** Playback starts at the elapsed offset, not at zero
#[test]
fn test_slow_load_resumes_at_elapsed_offset() {
    let rig = AudioRig::new();
    rig.play();
    rig.sync(0.0, rig.now());
    let ticket = rig.track.borrow_mut().begin_load().unwrap();

    rig.tick(500.0);
    let source = rig.station.source("clip.ogg", 30.0);
    rig.track.borrow_mut().finish_load(ticket, Some(source));

    assert!(rig.element().is_playing());
    assert!(approx_eq(rig.element().time(), 0.5, 1e-9));
    assert_eq!(rig.reporter.count(is_content(ContentState::Ready)), 1);
}

/// **Given:** A volume set before and after loading
/// **When:** Elements are created
/// **Then:** The clamped volume is applied to current and future elements
#[test]
fn test_volume_is_clamped_and_remembered() {
    let rig = AudioRig::new();
    rig.track.borrow_mut().set_volume(1.5);
    assert_eq!(rig.track.borrow().volume(), 1.0);

    rig.track.borrow_mut().set_volume(0.25);
    rig.load("a.ogg", 30.0);
    assert_eq!(rig.element().volume(), 0.25);

    rig.track.borrow_mut().set_volume(-1.0);
    assert_eq!(rig.element().volume(), 0.0);
}

// ============================================================================
// Async loads and destruction
// ============================================================================

fn pending_load() -> (oneshot::Sender<Box<dyn tsync_tracks::device::AudioSource>>, AudioLoad) {
    let (tx, rx) = oneshot::channel();
    (tx, async move { rx.await.ok() }.boxed_local())
}

/// **Given:** Two overlapping asynchronous loads
/// **When:** The newer one resolves before the older one
/// **Then:** Only the newer result is ever applied; the older is released
#[tokio::test]
async fn test_overlapping_async_loads_apply_latest_only() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let rig = AudioRig::new();
            rig.play();
            let (tx_old, old_load) = pending_load();
            let (tx_new, new_load) = pending_load();
            let old_task = spawn_audio_load(&rig.track, old_load).unwrap();
            let new_task = spawn_audio_load(&rig.track, new_load).unwrap();

            assert!(tx_new.send(rig.station.source("new.ogg", 30.0)).is_ok());
            new_task.await.unwrap();
            assert!(tx_old.send(rig.station.source("old.ogg", 30.0)).is_ok());
            old_task.await.unwrap();

            assert_eq!(rig.station.elements_created(), 1);
            assert_eq!(rig.element().url(), "new.ogg");
            assert_eq!(rig.station.released_sources(), 1);
        })
        .await;
}

/// **Given:** A load in flight
/// **When:** The track is destroyed before the load resolves
/// **Then:** The late completion reports nothing and releases its source
#[tokio::test]
async fn test_no_reports_after_destroy_with_pending_load() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let rig = AudioRig::new();
            rig.play();
            let (tx, load) = pending_load();
            let task = spawn_audio_load(&rig.track, load).unwrap();

            rig.track.borrow_mut().destroy();
            let before = rig.reporter.len();

            assert!(tx.send(rig.station.source("late.ogg", 30.0)).is_ok());
            task.await.unwrap();

            rig.play();
            rig.sync(1_000.0, rig.now());
            assert!(!rig.update(rig.now(), 1_000.0));
            assert!(rig.track.borrow_mut().begin_load().is_none());

            assert_eq!(rig.reporter.len(), before);
            assert_eq!(rig.station.elements_created(), 0);
            assert_eq!(rig.station.released_sources(), 1);
            assert_eq!(rig.track.borrow().state(), TrackState::Destroyed);
        })
        .await;
}

/// **Given:** A load in flight
/// **When:** The track itself is dropped
/// **Then:** The load still completes and releases its source
#[tokio::test]
async fn test_dropped_track_releases_late_load() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let rig = AudioRig::new();
            let (tx, load) = pending_load();
            let task = spawn_audio_load(&rig.track, load).unwrap();
            let station = rig.station.clone();
            drop(rig);

            assert!(tx.send(station.source("late.ogg", 30.0)).is_ok());
            task.await.unwrap();
            assert_eq!(station.released_sources(), 1);
            assert_eq!(station.elements_created(), 0);
        })
        .await;
}
