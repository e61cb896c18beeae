//! Toy scheduler driving simulated tracks
//!
//! Runs one video track and one audio track against a manual clock, the way
//! a host scheduler would: tick every track, hold the global clock while any
//! of them is stuck, and re-sync everything when playback continues.
//!
//! Must run inside a `tokio::task::LocalSet`; the audio clip is delivered by
//! an asynchronous load that completes partway through the run.

use std::cell::RefCell;
use std::rc::Rc;

use futures::FutureExt;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info};
use tsync_common::config::TomlConfig;
use tsync_common::events::{ReportRecord, TrackId};
use tsync_common::timing::{Clock, ManualClock};

use super::{SimAudioStation, SimVideo};
use crate::device::ReadyState;
use crate::registry::TrackRegistry;
use crate::reporter::ChannelReporter;
use crate::track::{spawn_audio_load, AudioLoad, AudioTrack, SharedTrack, VideoTrack};

const EVENT_CAPACITY: usize = 1024;

/// What to simulate (all times in ms)
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioOptions {
    /// Total simulated time
    pub run_ms: f64,
    /// Scheduler tick
    pub tick_ms: f64,
    pub video_secs: f64,
    pub audio_secs: f64,
    /// Simulated time until the audio clip finishes loading
    pub audio_load_ms: f64,
    /// Buffering stall on the video device, `(start, length)`
    pub stall: Option<(f64, f64)>,
    /// Freeze the video device at this time and seek it
    pub break_video_at: Option<f64>,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            run_ms: 10_000.0,
            tick_ms: 16.0,
            video_secs: 30.0,
            audio_secs: 30.0,
            audio_load_ms: 200.0,
            stall: None,
            break_video_at: None,
        }
    }
}

/// Outcome of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioSummary {
    pub ticks: u64,
    /// Ticks on which some track was stuck
    pub stuck_ticks: u64,
    /// Scheduler progress at the end (ms)
    pub final_progress_ms: f64,
    /// Video position at the end (ms)
    pub video_position_ms: f64,
    pub video_reloads: usize,
    pub events: usize,
}

/// Run a scenario, handing every report event to `on_event`
pub async fn run(
    options: &ScenarioOptions,
    config: &TomlConfig,
    mut on_event: impl FnMut(&ReportRecord),
) -> ScenarioSummary {
    let clock = ManualClock::new(0.0);
    let (video_reporter, mut rx) = ChannelReporter::channel(TrackId::from("video"), EVENT_CAPACITY);
    let audio_reporter = video_reporter.for_track(TrackId::from("audio"));

    let video = SimVideo::new(options.video_secs);
    video.make_ready();
    let video_track = Rc::new(RefCell::new(VideoTrack::from_config(
        TrackId::from("video"),
        Rc::new(video_reporter),
        Rc::new(clock.clone()),
        config,
    )));
    {
        let mut track = video_track.borrow_mut();
        track.attach_device(video.boxed());
        track.show();
    }

    let station = SimAudioStation::new();
    let audio_track = Rc::new(RefCell::new(AudioTrack::from_config(
        TrackId::from("audio"),
        Rc::new(station.clone()),
        Rc::new(audio_reporter),
        Rc::new(clock.clone()),
        config,
    )));
    let (source_tx, source_rx) = oneshot::channel();
    let load: AudioLoad = async move { source_rx.await.ok() }.boxed_local();
    let _load_task = spawn_audio_load(&audio_track, load);
    let mut pending_source = Some((source_tx, station.source("clip.ogg", options.audio_secs)));

    let mut registry = TrackRegistry::new();
    let video_shared: SharedTrack = video_track.clone();
    let audio_shared: SharedTrack = audio_track.clone();
    for track in [video_shared, audio_shared] {
        if let Err(e) = registry.attach(track) {
            debug!("Scenario attach failed: {}", e);
        }
    }

    let mut summary = ScenarioSummary::default();
    let mut progress = 0.0;
    let mut waiting = false;
    let mut stalled = false;
    let mut broken = false;
    let mut seen_loads = 0;

    registry.sync_all(progress, clock.now_ms());
    registry.play_all();

    while clock.now_ms() < options.run_ms {
        clock.advance(options.tick_ms);
        let now = clock.now_ms();
        video.advance(options.tick_ms);
        station.advance(options.tick_ms);
        if !waiting {
            progress += options.tick_ms;
        }

        if now >= options.audio_load_ms {
            if let Some((tx, source)) = pending_source.take() {
                // Receiver gone means the track was destroyed; the source is released
                let _ = tx.send(source);
                tokio::task::yield_now().await;
            }
        }

        if let Some((start, length)) = options.stall {
            let in_stall = now >= start && now < start + length;
            if in_stall && !stalled {
                info!("Scenario: video buffering stall at {:.0}ms", now);
                let position = video.position();
                video.set_ready_state(ReadyState::CurrentData);
                video.set_buffered(&[(0.0, position + 0.5)]);
            } else if !in_stall && stalled {
                info!("Scenario: video stall over at {:.0}ms", now);
                video.make_ready();
            }
            stalled = in_stall;
        }

        if let Some(at) = options.break_video_at {
            if now >= at && !broken {
                info!("Scenario: freezing video device at {:.0}ms", now);
                broken = true;
                video.break_device();
                registry.sync_all(progress, now);
            }
        }

        // Platform finishes a reload within one tick
        if video.load_count() > seen_loads {
            seen_loads = video.load_count();
            video.make_ready();
        }

        let stuck = registry.update_all(now, progress);
        summary.ticks += 1;
        if stuck {
            summary.stuck_ticks += 1;
            if !waiting {
                waiting = true;
                registry.pause_all();
            }
        } else if waiting {
            waiting = false;
            registry.sync_all(progress, now);
            registry.play_all();
        }

        tokio::task::yield_now().await;
        summary.events += drain(&mut rx, &mut on_event);
    }

    summary.final_progress_ms = progress;
    summary.video_position_ms = video.position() * 1000.0;
    summary.video_reloads = video.load_count();
    drop(registry);
    summary.events += drain(&mut rx, &mut on_event);
    summary
}

fn drain(rx: &mut broadcast::Receiver<ReportRecord>, on_event: &mut impl FnMut(&ReportRecord)) -> usize {
    let mut count = 0;
    loop {
        match rx.try_recv() {
            Ok(record) => {
                on_event(&record);
                count += 1;
            }
            Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                debug!("Scenario event receiver lagged, {} events missed", missed);
            }
            Err(_) => return count,
        }
    }
}
