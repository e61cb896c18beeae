//! Shared rigs for track integration tests
//!
//! Each rig wires a track to simulated devices, a manual clock and a
//! recording reporter, and keeps handles to all of them for inspection.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use tsync_common::config::SyncTuning;
use tsync_common::events::{ContentState, ReportEvent, TrackId};
use tsync_common::timing::{Clock, ManualClock};
use tsync_tracks::recovery::{RecoveryPolicy, TrustDevice};
use tsync_tracks::sim::{SimAudioElementHandle, SimAudioStation, SimVideo};
use tsync_tracks::{AudioTrack, RecordingReporter, Track, VideoTrack};

/// Clock start; nonzero so time arithmetic never hides behind zero
pub const START_MS: f64 = 1_000.0;

/// Length of the simulated video (s)
pub const VIDEO_SECS: f64 = 10.0;

pub fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

pub fn is_progress(e: &ReportEvent) -> bool {
    matches!(e, ReportEvent::Progress { .. })
}

pub fn is_stuck(e: &ReportEvent) -> bool {
    matches!(e, ReportEvent::Stuck { .. })
}

pub fn is_unstuck(e: &ReportEvent) -> bool {
    matches!(e, ReportEvent::Unstuck { .. })
}

pub fn is_finished(e: &ReportEvent) -> bool {
    matches!(e, ReportEvent::Finished { .. })
}

pub fn is_content(state: ContentState) -> impl Fn(&ReportEvent) -> bool {
    move |e: &ReportEvent| matches!(e, ReportEvent::ContentState { state: s, .. } if *s == state)
}

/// Log events containing `needle`
pub fn logs_containing(reporter: &RecordingReporter, needle: &str) -> usize {
    reporter.count(|e| matches!(e, ReportEvent::Log { message, .. } if message.contains(needle)))
}

// ============================================================================
// Video
// ============================================================================

pub struct VideoRig {
    pub clock: ManualClock,
    pub reporter: RecordingReporter,
    pub video: SimVideo,
    pub track: VideoTrack,
}

impl VideoRig {
    /// Device attached and shown, not ready yet
    pub fn new() -> Self {
        Self::with_recovery(Box::new(TrustDevice))
    }

    pub fn with_recovery(recovery: Box<dyn RecoveryPolicy>) -> Self {
        Self::build("video", recovery)
    }

    /// Ready rig whose track reports under `id`
    pub fn ready_named(id: &str) -> Self {
        let mut rig = Self::build(id, Box::new(TrustDevice));
        rig.video.make_ready();
        rig.track.mark_ready();
        rig
    }

    /// Named rig, device attached and shown but not ready
    pub fn named(id: &str) -> Self {
        Self::build(id, Box::new(TrustDevice))
    }

    fn build(id: &str, recovery: Box<dyn RecoveryPolicy>) -> Self {
        let clock = ManualClock::new(START_MS);
        let reporter = RecordingReporter::new(TrackId::from(id));
        let video = SimVideo::new(VIDEO_SECS);
        let mut track = VideoTrack::new(
            TrackId::from(id),
            Rc::new(reporter.clone()),
            Rc::new(clock.clone()),
            SyncTuning::default(),
            recovery,
        );
        track.attach_device(video.boxed());
        track.show();
        Self {
            clock,
            reporter,
            video,
            track,
        }
    }

    /// Device fully buffered and marked ready, paused at zero
    pub fn ready() -> Self {
        Self::ready_with_recovery(Box::new(TrustDevice))
    }

    pub fn ready_with_recovery(recovery: Box<dyn RecoveryPolicy>) -> Self {
        let mut rig = Self::with_recovery(recovery);
        rig.video.make_ready();
        rig.track.mark_ready();
        rig
    }

    pub fn now(&self) -> f64 {
        self.clock.now_ms()
    }

    /// Advance clock and device together
    pub fn tick(&mut self, dt_ms: f64) {
        self.clock.advance(dt_ms);
        self.video.advance(dt_ms);
    }

    /// Update with the scheduler progress a clean clock would give
    pub fn update_at(&mut self, progress: f64) -> bool {
        let now = self.now();
        self.track.update(now, progress)
    }

    pub fn position_ms(&self) -> f64 {
        self.video.position() * 1000.0
    }
}

// ============================================================================
// Audio
// ============================================================================

pub struct AudioRig {
    pub clock: ManualClock,
    pub reporter: RecordingReporter,
    pub station: SimAudioStation,
    pub track: Rc<RefCell<AudioTrack>>,
}

impl AudioRig {
    pub fn new() -> Self {
        let clock = ManualClock::new(START_MS);
        let reporter = RecordingReporter::new(TrackId::from("audio"));
        let station = SimAudioStation::new();
        let track = AudioTrack::new(
            TrackId::from("audio"),
            Rc::new(station.clone()),
            Rc::new(reporter.clone()),
            Rc::new(clock.clone()),
            SyncTuning::default(),
        );
        Self {
            clock,
            reporter,
            station,
            track: Rc::new(RefCell::new(track)),
        }
    }

    /// Rig with a clip already loaded
    pub fn loaded(secs: f64) -> Self {
        let rig = Self::new();
        rig.load("clip.ogg", secs);
        rig
    }

    /// Load a clip synchronously
    pub fn load(&self, url: &str, secs: f64) {
        let ticket = self
            .track
            .borrow_mut()
            .begin_load()
            .expect("track destroyed");
        let source = self.station.source(url, secs);
        self.track.borrow_mut().finish_load(ticket, Some(source));
    }

    pub fn now(&self) -> f64 {
        self.clock.now_ms()
    }

    /// Advance clock and audio graph together
    pub fn tick(&self, dt_ms: f64) {
        self.clock.advance(dt_ms);
        self.station.advance(dt_ms);
    }

    pub fn element(&self) -> SimAudioElementHandle {
        self.station.last_element().expect("no element created")
    }

    pub fn play(&self) {
        self.track.borrow_mut().play();
    }

    pub fn pause(&self) {
        self.track.borrow_mut().pause();
    }

    pub fn sync(&self, progress: f64, time: f64) {
        self.track.borrow_mut().sync(progress, time);
    }

    pub fn update(&self, time: f64, progress: f64) -> bool {
        self.track.borrow_mut().update(time, progress)
    }

    /// Element playing through an unsuspended mixer
    pub fn audible(&self) -> bool {
        self.station
            .last_element()
            .is_some_and(|e| e.is_playing() && !e.is_dropped())
            && self.station.mixer_suspended(0) == Some(false)
    }
}
