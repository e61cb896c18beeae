//! Video track controller
//!
//! Drives one buffered video device against the scheduler's clock.
//!
//! **Progress reporting:** reading the device position on every tick is
//! both imprecise and expensive, so the controller remembers when it last
//! reported while the device was actually playing and only reports again
//! once that is older than the staleness threshold.
//!
//! **Readiness:** seeks are cached until the device is ready and replayed
//! exactly once. The device becomes ready either through the host's
//! readiness callback (`mark_ready`) or the first time the update loop finds
//! enough buffered data.
//!
//! **Broken devices:** after each seek the next progress report is checked
//! by the injected recovery policy; a device whose seek never landed is
//! reloaded, keeping the position it should have reached.

use std::rc::Rc;
use tracing::{debug, info, warn};
use tsync_common::config::{SyncTuning, TomlConfig};
use tsync_common::events::{ContentState, TrackId};
use tsync_common::timing::{is_stale, Clock, ClockSample};

use super::{Track, TrackState};
use crate::detector::{self, BufferPolicy, StuckEdge, StuckLatch};
use crate::device::{VideoAdapter, VideoDevice};
use crate::intent::{transition, DeviceEffect, IntentEvent, PlayIntent};
use crate::recovery::{self, RecoveryAction, RecoveryPolicy, SeekObservation};
use crate::reporter::TrackReporter;

/// A seek that has been issued to the device
#[derive(Debug, Clone, Copy, PartialEq)]
struct IssuedSeek {
    target_ms: f64,
    issued_at: f64,
    /// Device was running (unpaused, not ended) when the seek went out
    running: bool,
}

pub struct VideoTrack {
    id: TrackId,
    adapter: Option<VideoAdapter>,
    reporter: Option<Rc<dyn TrackReporter>>,
    clock: Rc<dyn Clock>,
    tuning: SyncTuning,
    buffer_policy: BufferPolicy,
    recovery: Box<dyn RecoveryPolicy>,

    intent: PlayIntent,
    /// Surface visible; nothing plays before this
    shown: bool,
    /// Seek requested before the device could take it (ms)
    cached_seek_ms: Option<f64>,
    /// Last time progress was reported while the device was playing
    last_sync_time: Option<f64>,
    /// Seek awaiting its first progress report
    last_seek: Option<IssuedSeek>,
    /// Newest sync sample accepted
    last_sample: Option<ClockSample>,
    stuck: StuckLatch,
    /// End of track already signalled for the current target
    finished: bool,
    destroyed: bool,
}

impl VideoTrack {
    pub fn new(
        id: TrackId,
        reporter: Rc<dyn TrackReporter>,
        clock: Rc<dyn Clock>,
        tuning: SyncTuning,
        recovery: Box<dyn RecoveryPolicy>,
    ) -> Self {
        Self {
            id,
            adapter: None,
            reporter: Some(reporter),
            clock,
            buffer_policy: BufferPolicy::from(&tuning),
            tuning,
            recovery,
            intent: PlayIntent::default(),
            shown: false,
            cached_seek_ms: None,
            last_sync_time: None,
            last_seek: None,
            last_sample: None,
            stuck: StuckLatch::default(),
            finished: false,
            destroyed: false,
        }
    }

    /// Build with tunables and recovery policy from a config file
    pub fn from_config(
        id: TrackId,
        reporter: Rc<dyn TrackReporter>,
        clock: Rc<dyn Clock>,
        config: &TomlConfig,
    ) -> Self {
        let recovery = recovery::policy_for(&config.recovery, &config.sync);
        Self::new(id, reporter, clock, config.sync.clone(), recovery)
    }

    // ------------------------------------------------------------------
    // Host-facing lifecycle
    // ------------------------------------------------------------------

    /// Attach a device, replacing any previous one
    pub fn attach_device(&mut self, device: Box<dyn VideoDevice>) {
        if self.destroyed {
            return;
        }
        self.detach_device();
        self.adapter = Some(VideoAdapter::new(device));
        info!("Video track {} device attached", self.id);
        if let Some(reporter) = &self.reporter {
            reporter.update_content_state(ContentState::Preloading);
        }
    }

    /// Release the device, remembering where it was
    pub fn detach_device(&mut self) {
        if let Some(adapter) = self.adapter.take() {
            if adapter.is_ready() && self.cached_seek_ms.is_none() {
                self.cached_seek_ms = Some(adapter.position_ms());
            }
            self.last_sync_time = None;
            self.last_seek = None;
            self.stuck.reset();
            debug!("Video track {} device detached", self.id);
        }
    }

    /// Video surface became visible
    pub fn show(&mut self) {
        if self.destroyed {
            return;
        }
        self.shown = true;
        if self.intent.should_play() {
            self.play_device();
        }
    }

    /// Host readiness callback; safe to call repeatedly or after destroy
    pub fn mark_ready(&mut self) {
        if self.destroyed {
            return;
        }
        let became_ready = match self.adapter.as_mut() {
            Some(adapter) => adapter.mark_ready(),
            None => false,
        };
        if became_ready {
            self.on_ready();
        }
    }

    /// Reload the device, keeping `resume_at_ms` as the cached seek
    pub fn reload(&mut self, resume_at_ms: f64) {
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.reload();
            self.last_sync_time = None;
            self.last_seek = None;
            self.cached_seek_ms = Some(resume_at_ms);
        }
    }

    pub fn intent(&self) -> PlayIntent {
        self.intent
    }

    pub fn is_ready(&self) -> bool {
        self.adapter.as_ref().is_some_and(|a| a.is_ready())
    }

    pub fn cached_seek_ms(&self) -> Option<f64> {
        self.cached_seek_ms
    }

    pub fn tuning(&self) -> &SyncTuning {
        &self.tuning
    }

    // ------------------------------------------------------------------
    // Device operations
    // ------------------------------------------------------------------

    fn log(&self, message: &str) {
        debug!("Video track {}: {}", self.id, message);
        if let Some(reporter) = &self.reporter {
            reporter.log(message);
        }
    }

    fn device_should_play(&self) -> bool {
        self.intent.should_play() && self.shown
    }

    fn play_device(&mut self) {
        let Some(adapter) = self.adapter.as_mut() else {
            return;
        };
        if !adapter.is_ready() || !self.shown || adapter.is_playing() || adapter.device().ended()
        {
            return;
        }
        if let Err(e) = adapter.device_mut().play() {
            warn!("Video track {} play failed: {}", self.id, e);
            self.log(&format!("Play failed, will retry on next play: {}", e));
        }
    }

    fn pause_device(&mut self) {
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.device_mut().pause();
        }
    }

    fn on_ready(&mut self) {
        if self.device_should_play() {
            self.play_device();
        } else {
            self.pause_device();
            self.last_sync_time = None;
        }
        if let Some(target) = self.cached_seek_ms.take() {
            self.apply_seek(target);
        }
    }

    /// Seek, cache, or finish depending on device readiness and duration
    fn apply_seek(&mut self, target_ms: f64) {
        let now = self.clock.now_ms();
        let Some(adapter) = self.adapter.as_mut() else {
            self.cached_seek_ms = Some(target_ms);
            return;
        };
        if !adapter.is_ready() {
            self.cached_seek_ms = Some(target_ms);
            return;
        }

        if let Some(duration_ms) = adapter.duration_ms() {
            if target_ms > duration_ms {
                if !self.finished {
                    self.finished = true;
                    info!(
                        "Video track {} target {:.1}ms beyond duration {:.1}ms, finishing",
                        self.id, target_ms, duration_ms
                    );
                    if let Some(reporter) = &self.reporter {
                        reporter.finish_itself();
                    }
                }
                return;
            }
        }

        self.finished = false;
        adapter.seek_ms(target_ms);
        let running = !adapter.device().paused() && !adapter.device().ended();
        self.last_seek = Some(IssuedSeek {
            target_ms,
            issued_at: now,
            running,
        });
    }

    fn report_progress(&mut self) {
        if self.reporter.is_none() {
            return;
        }
        let Some(adapter) = self.adapter.as_ref() else {
            return;
        };
        let now = self.clock.now_ms();
        let progress = adapter.position_ms();
        let playing = adapter.is_playing();
        if let Some(reporter) = &self.reporter {
            reporter.report_progress(progress);
        }

        if self.assess_pending_seek() {
            return;
        }
        self.last_sync_time = if playing { Some(now) } else { None };
    }

    /// Judge the last issued seek against the device position; true if the
    /// device was reloaded
    ///
    /// The device may have advanced if it was running at either end of the
    /// interval since the seek.
    fn assess_pending_seek(&mut self) -> bool {
        let Some(seek) = self.last_seek.take() else {
            return false;
        };
        let Some(adapter) = self.adapter.as_ref() else {
            return false;
        };
        let device = adapter.device();
        let observation = SeekObservation {
            target_ms: seek.target_ms,
            observed_ms: adapter.position_ms(),
            elapsed_ms: self.clock.now_ms() - seek.issued_at,
            playing: seek.running || (!device.paused() && !device.ended()),
        };
        if self.recovery.assess_seek(&observation) != RecoveryAction::ReloadDevice {
            return false;
        }

        let resume_at = if observation.playing {
            seek.target_ms + observation.elapsed_ms.max(0.0)
        } else {
            seek.target_ms
        };
        warn!(
            "Video track {} seek to {:.1}ms landed at {:.1}ms, device is broken, reloading ({})",
            self.id,
            seek.target_ms,
            observation.observed_ms,
            self.recovery.name()
        );
        self.log("The video device is broken, reload video");
        self.reload(resume_at);
        true
    }

    /// Correct a device whose play state silently diverged from the intent
    fn check_playing_state(&mut self) {
        let Some(adapter) = self.adapter.as_ref() else {
            return;
        };
        if !adapter.is_ready() || adapter.device().ended() {
            return;
        }
        let should_play = self.device_should_play();
        let device_playing = !adapter.device().paused();
        if should_play == device_playing {
            return;
        }

        warn!(
            "Video track {} unmatched playing state: should be {} instead of {}",
            self.id, should_play, device_playing
        );
        self.log(&format!(
            "Unmatched playing state: should be {} instead of {}",
            should_play, device_playing
        ));
        if should_play {
            self.play_device();
            self.report_progress();
        } else {
            self.pause_device();
            self.report_progress();
            self.last_sync_time = None;
        }
    }

    fn apply_intent(&mut self, event: IntentEvent) {
        if self.destroyed {
            return;
        }
        let (next, effects) = transition(self.intent, event);
        self.intent = next;
        // Judge a pending seek while the device still runs
        if effects.contains(&DeviceEffect::PauseDevice) {
            self.assess_pending_seek();
        }
        for effect in effects {
            match effect {
                DeviceEffect::StartDevice => self.play_device(),
                DeviceEffect::PauseDevice => self.pause_device(),
                DeviceEffect::ForgetSyncTime => self.last_sync_time = None,
                DeviceEffect::ReportProgress => self.report_progress(),
            }
        }
    }

    fn enter_stuck(&mut self) {
        if self.stuck.set(true) != Some(StuckEdge::BecameStuck) {
            return;
        }
        let Some(adapter) = self.adapter.as_mut() else {
            return;
        };
        let reasons = detector::stuck_reasons(&adapter.device().telemetry());
        // Touching a device that is not ready is itself a seek hazard
        if adapter.is_ready() {
            detector::nudge(adapter.device_mut());
        }
        let message = format!("Stuck reason: {}", detector::describe(&reasons));
        info!("Video track {} {}", self.id, message);
        self.log(&message);
        if let Some(reporter) = &self.reporter {
            reporter.report_stuck();
        }
    }

    fn leave_stuck(&mut self) {
        let unstuck = self.stuck.set(false) == Some(StuckEdge::BecameUnstuck);
        let became_ready = match self.adapter.as_mut() {
            Some(adapter) => adapter.mark_ready(),
            None => false,
        };
        if let Some(reporter) = &self.reporter {
            if unstuck {
                reporter.report_unstuck();
            }
            if unstuck || became_ready {
                reporter.update_content_state(ContentState::Ready);
            }
        }
        if unstuck {
            info!("Video track {} unstuck", self.id);
        }
        if became_ready {
            self.on_ready();
        }
    }
}

impl Track for VideoTrack {
    fn id(&self) -> &TrackId {
        &self.id
    }

    fn play(&mut self) {
        self.apply_intent(IntentEvent::Play);
    }

    fn pause(&mut self) {
        self.apply_intent(IntentEvent::Pause);
    }

    fn resume(&mut self) {
        self.apply_intent(IntentEvent::Resume);
    }

    fn suspend(&mut self) {
        self.apply_intent(IntentEvent::Suspend);
    }

    fn sync(&mut self, progress: f64, time: f64) {
        if self.destroyed {
            return;
        }
        let sample = ClockSample::new(time, progress);
        if let Some(last) = self.last_sample {
            if !sample.supersedes(&last) {
                debug!(
                    "Video track {} discarding stale sync sample (time {:.1} < {:.1})",
                    self.id, time, last.time
                );
                return;
            }
        }
        self.last_sample = Some(sample);

        let target = sample.target_at(self.clock.now_ms());
        if self.adapter.is_none() {
            self.cached_seek_ms = Some(target);
            return;
        }
        self.check_playing_state();
        self.apply_seek(target);
    }

    fn update(&mut self, time: f64, progress: f64) -> bool {
        if self.destroyed {
            return false;
        }

        // Until the device can take a seek, keep the cached target on the
        // scheduler's clock so the device starts where the track should be
        if !self.is_ready() {
            let sample = ClockSample::new(time, progress);
            if self.last_sample.map_or(true, |last| sample.supersedes(&last)) {
                self.cached_seek_ms = Some(sample.target_at(self.clock.now_ms()));
            }
        }

        self.check_playing_state();

        let Some(adapter) = self.adapter.as_ref() else {
            return false;
        };
        let telemetry = adapter.device().telemetry();

        if telemetry.ended || self.buffer_policy.has_enough_buffer(&telemetry) {
            self.leave_stuck();
            let now = self.clock.now_ms();
            if self.intent.should_play()
                && is_stale(now, self.last_sync_time, self.tuning.staleness_threshold_ms)
            {
                self.report_progress();
            }
            return false;
        }

        self.enter_stuck();
        true
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        if let Some(mut adapter) = self.adapter.take() {
            adapter.device_mut().pause();
        }
        self.reporter = None;
        self.cached_seek_ms = None;
        self.last_seek = None;
        self.last_sync_time = None;
        info!("Video track {} destroyed", self.id);
    }

    fn state(&self) -> TrackState {
        if self.destroyed {
            return TrackState::Destroyed;
        }
        let Some(adapter) = self.adapter.as_ref() else {
            return TrackState::Unattached;
        };
        if self.stuck.is_stuck() {
            return TrackState::Stuck;
        }
        if !adapter.is_ready() {
            return TrackState::AttachedNotReady;
        }
        if adapter.device().ended() {
            return TrackState::Ended;
        }
        if self.intent.suspended {
            TrackState::Suspended
        } else if self.intent.playing {
            TrackState::Playing
        } else {
            TrackState::Paused
        }
    }
}
