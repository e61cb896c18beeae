//! Audio track controller
//!
//! Audio output time cannot be read precisely, so the controller keeps its
//! own `(last_update_time, last_progress)` observation and extrapolates from
//! it. The observation only moves when the element's reported position grew
//! by a meaningful amount, which filters out the coarse steps audio clocks
//! report in.
//!
//! Play/pause act on the track's element, suspend/resume on its mixer. The
//! track is audible only when the element plays, the mixer is not suspended
//! and the shared output context runs.

use std::rc::Rc;
use tracing::{debug, info, warn};
use tsync_common::config::{SyncTuning, TomlConfig};
use tsync_common::events::{ContentState, StuckReason, TrackId};
use tsync_common::timing::{
    exceeds_drift, extrapolate, has_advanced, is_stale, ms_to_secs, secs_to_ms, Clock,
    ClockSample,
};

use super::{Track, TrackState};
use crate::detector::{StuckEdge, StuckLatch};
use crate::device::{AudioAdapter, AudioSource, AudioStation, ContextState, Installed, LoadTicket};
use crate::intent::{transition, DeviceEffect, IntentEvent, PlayIntent};
use crate::reporter::TrackReporter;

pub struct AudioTrack {
    id: TrackId,
    /// `None` once destroyed
    adapter: Option<AudioAdapter>,
    reporter: Option<Rc<dyn TrackReporter>>,
    clock: Rc<dyn Clock>,
    tuning: SyncTuning,
    resume_suspended_context: bool,

    intent: PlayIntent,
    /// Newest scheduler sample
    cached_sample: Option<ClockSample>,
    last_progress: f64,
    last_update_time: f64,
    /// Last time progress was reported while audible
    last_report_time: Option<f64>,
    stuck: StuckLatch,
    /// End of clip already signalled for the current target
    finished: bool,
    volume: f32,
    destroyed: bool,
}

impl AudioTrack {
    pub fn new(
        id: TrackId,
        station: Rc<dyn AudioStation>,
        reporter: Rc<dyn TrackReporter>,
        clock: Rc<dyn Clock>,
        tuning: SyncTuning,
    ) -> Self {
        let now = clock.now_ms();
        Self {
            id,
            adapter: Some(AudioAdapter::new(station)),
            reporter: Some(reporter),
            clock,
            tuning,
            resume_suspended_context: true,
            intent: PlayIntent::default(),
            cached_sample: None,
            last_progress: 0.0,
            last_update_time: now,
            last_report_time: None,
            stuck: StuckLatch::default(),
            finished: false,
            volume: 1.0,
            destroyed: false,
        }
    }

    pub fn from_config(
        id: TrackId,
        station: Rc<dyn AudioStation>,
        reporter: Rc<dyn TrackReporter>,
        clock: Rc<dyn Clock>,
        config: &TomlConfig,
    ) -> Self {
        let mut track = Self::new(id, station, reporter, clock, config.sync.clone());
        track.resume_suspended_context = config.recovery.resume_suspended_audio_context;
        track
    }

    /// Audio track's own view of the clock
    ///
    /// `None` while the output context is suspended or nothing is loaded.
    pub fn check(&mut self) -> Option<ClockSample> {
        let adapter = self.adapter.as_ref()?;
        if adapter.station().context_state() == ContextState::Suspended {
            return None;
        }
        adapter.element()?;
        self.update_time(false);
        Some(ClockSample::new(self.last_update_time, self.last_progress))
    }

    /// Set playback volume, clamped to `0.0..=1.0`
    ///
    /// Remembered for elements created by later loads.
    pub fn set_volume(&mut self, volume: f32) {
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
        self.volume = volume;
        if let Some(element) = self.adapter.as_mut().and_then(|a| a.element_mut()) {
            element.set_volume(volume);
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn intent(&self) -> PlayIntent {
        self.intent
    }

    /// Start a load, superseding any still in flight
    ///
    /// Returns `None` once destroyed.
    pub fn begin_load(&mut self) -> Option<LoadTicket> {
        if self.destroyed {
            return None;
        }
        let adapter = self.adapter.as_mut()?;
        let ticket = adapter.begin_load();
        debug!(
            "Audio track {} load {} started",
            self.id,
            ticket.generation()
        );
        if let Some(reporter) = &self.reporter {
            reporter.update_content_state(ContentState::Preloading);
        }
        Some(ticket)
    }

    /// Apply a finished load
    ///
    /// A superseded or post-destroy completion only releases its source.
    /// `None` means the load produced nothing and the element is unloaded.
    pub fn finish_load(&mut self, ticket: LoadTicket, source: Option<Box<dyn AudioSource>>) {
        let current = !self.destroyed && self.adapter.as_ref().is_some_and(|a| a.is_current(ticket));
        if !current {
            debug!(
                "Audio track {} discarding stale load {}",
                self.id,
                ticket.generation()
            );
            return;
        }

        match source {
            Some(source) => self.install_source(source),
            None => {
                if let Some(adapter) = self.adapter.as_mut() {
                    adapter.unload();
                }
                self.log("Audio cleared");
            }
        }

        self.update_time(true);
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.complete_load();
        }
    }

    fn install_source(&mut self, source: Box<dyn AudioSource>) {
        let now = self.clock.now_ms();
        let url = source.url().to_string();
        let Some(adapter) = self.adapter.as_mut() else {
            return;
        };
        if adapter.install(source, self.volume) == Installed::SameUrl {
            return;
        }

        let sample = self
            .cached_sample
            .unwrap_or_else(|| ClockSample::new(now, self.last_progress));
        // A slow load resumes where the track should be now, not where it was
        let target = if self.intent.should_play() {
            sample.target_at(now)
        } else {
            sample.progress
        };
        if self.intent.playing {
            if let Some(element) = adapter.element_mut() {
                if let Err(e) = element.play() {
                    warn!("Audio track {} play failed: {}", self.id, e);
                }
            }
        }
        self.seek_element(target);

        self.log(&format!("Loaded, url: {}", url));
        if let Some(reporter) = &self.reporter {
            reporter.update_content_state(ContentState::Ready);
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn log(&self, message: &str) {
        info!("Audio track {}: {}", self.id, message);
        if let Some(reporter) = &self.reporter {
            reporter.log(message);
        }
    }

    fn is_audible(&self) -> bool {
        self.adapter.as_ref().is_some_and(|a| a.is_audible())
    }

    /// Refresh the cached observation from the element
    fn update_time(&mut self, force: bool) {
        let now = self.clock.now_ms();
        let audible = self.is_audible();
        let Some(element) = self.adapter.as_ref().and_then(|a| a.element()) else {
            if let Some(sample) = self.cached_sample {
                self.last_update_time = sample.time;
                self.last_progress = sample.progress;
            }
            return;
        };
        let observed = secs_to_ms(element.time());

        if audible {
            let elapsed = now - self.last_update_time;
            if force
                || has_advanced(
                    observed,
                    self.last_progress,
                    elapsed,
                    self.tuning.progress_growth_ratio,
                )
            {
                self.last_progress = observed;
                self.last_update_time = now;
            }
        } else {
            if force || observed > self.last_progress {
                self.last_progress = observed;
            }
            self.last_update_time = now;
        }
    }

    /// Extrapolated progress at the current time (ms)
    ///
    /// Nothing to extrapolate from before the first element or sample.
    fn current_progress(&self) -> f64 {
        let has_element = self.adapter.as_ref().is_some_and(|a| a.element().is_some());
        if !has_element && self.cached_sample.is_none() {
            return self.last_progress;
        }
        extrapolate(self.last_progress, self.last_update_time, self.clock.now_ms())
    }

    /// Target lies past the end of the loaded clip
    fn beyond_clip(&self, target_ms: f64) -> bool {
        self.adapter
            .as_ref()
            .and_then(|a| a.element())
            .and_then(|e| e.duration())
            .is_some_and(|d| d.is_finite() && ms_to_secs(target_ms) > d)
    }

    /// Seek the element, or signal end of clip when the target is past it
    fn seek_element(&mut self, target_ms: f64) {
        if self.beyond_clip(target_ms) {
            if !self.finished {
                self.finished = true;
                info!(
                    "Audio track {} target {:.1}ms beyond the clip, finishing",
                    self.id, target_ms
                );
                if let Some(reporter) = &self.reporter {
                    reporter.finish_itself();
                }
            }
            return;
        }
        let Some(element) = self.adapter.as_mut().and_then(|a| a.element_mut()) else {
            return;
        };
        self.finished = false;
        element.set_time(ms_to_secs(target_ms.max(0.0)));
        self.update_time(true);
    }

    /// Keep the newest sample; returns the one in effect
    fn accept_sample(&mut self, sample: ClockSample) -> Option<ClockSample> {
        match self.cached_sample {
            Some(last) if !sample.supersedes(&last) => {
                debug!(
                    "Audio track {} discarding stale sample (time {:.1} < {:.1})",
                    self.id, sample.time, last.time
                );
                None
            }
            _ => {
                self.cached_sample = Some(sample);
                Some(sample)
            }
        }
    }

    fn report_progress(&mut self) {
        let Some(reporter) = self.reporter.clone() else {
            return;
        };
        reporter.report_progress(self.current_progress());
        self.last_report_time = if self.is_audible() {
            Some(self.clock.now_ms())
        } else {
            None
        };
    }

    fn element_ended(&self) -> bool {
        let Some(element) = self.adapter.as_ref().and_then(|a| a.element()) else {
            return false;
        };
        !element.is_playing()
            && element
                .duration()
                .is_some_and(|d| d.is_finite() && element.time() >= d)
    }

    fn play_element(&mut self) {
        let Some(element) = self.adapter.as_mut().and_then(|a| a.element_mut()) else {
            return;
        };
        if element.is_playing() {
            return;
        }
        if let Err(e) = element.play() {
            warn!("Audio track {} play failed: {}", self.id, e);
            self.log(&format!("Play failed, will retry on next play: {}", e));
        }
    }

    fn pause_element(&mut self) {
        let was_audible = self.is_audible();
        let pinned = self.current_progress();
        let Some(element) = self.adapter.as_mut().and_then(|a| a.element_mut()) else {
            return;
        };
        element.pause();
        if was_audible {
            // Never rewind after pause
            element.set_time(ms_to_secs(pinned));
        }
    }

    /// Bring mixer and element in line with the intent flags
    fn reconcile_device(&mut self) {
        let suspended = self.intent.suspended;
        if let Some(adapter) = self.adapter.as_mut() {
            if adapter.mixer().is_suspended() != suspended {
                if suspended {
                    adapter.mixer_mut().suspend();
                } else {
                    adapter.mixer_mut().resume();
                }
            }
        }
        if self.intent.playing {
            self.play_element();
        } else {
            self.pause_element();
        }
    }

    fn apply_intent(&mut self, event: IntentEvent) {
        if self.destroyed {
            return;
        }
        self.update_time(false);
        let (next, effects) = transition(self.intent, event);
        self.intent = next;
        self.reconcile_device();
        self.update_time(false);
        for effect in effects {
            match effect {
                DeviceEffect::ForgetSyncTime => self.last_report_time = None,
                DeviceEffect::ReportProgress => self.report_progress(),
                // Device already follows the flags
                DeviceEffect::StartDevice | DeviceEffect::PauseDevice => {}
            }
        }
    }

    fn stuck_reason(&self) -> Option<StuckReason> {
        let adapter = self.adapter.as_ref()?;
        match adapter.element() {
            None if adapter.has_pending_load() => Some(StuckReason::NotLoaded),
            Some(element) if element.is_stuck() => Some(StuckReason::DeviceStalled),
            _ => None,
        }
    }
}

impl Track for AudioTrack {
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
        let Some(sample) = self.accept_sample(ClockSample::new(time, progress)) else {
            return;
        };
        let target = sample.target_at(self.clock.now_ms());
        self.seek_element(target);
    }

    fn update(&mut self, time: f64, progress: f64) -> bool {
        if self.destroyed {
            return false;
        }

        // Some platforms suspend the shared context without notice
        if self.resume_suspended_context {
            if let Some(adapter) = self.adapter.as_ref() {
                if adapter.station().context_state() != ContextState::Running {
                    debug!("Audio track {} resuming output context", self.id);
                    adapter.station().resume_context();
                }
            }
        }

        let sample = self
            .accept_sample(ClockSample::new(time, progress))
            .or(self.cached_sample);

        let has_element = self.adapter.as_ref().is_some_and(|a| a.element().is_some());
        if has_element {
            self.update_time(false);
            if let Some(sample) = sample {
                let now = self.clock.now_ms();
                let target = sample.target_at(now);
                let current = self.current_progress();
                // Already finished; nothing to resync to
                let past_end = self.finished && self.beyond_clip(target);
                if !past_end && exceeds_drift(target, current, self.tuning.drift_tolerance_ms) {
                    self.log(&format!("Resync from {:.1} to {:.1}", current, target));
                    self.seek_element(target);
                }
            }

            let element_playing = self
                .adapter
                .as_ref()
                .and_then(|a| a.element())
                .is_some_and(|e| e.is_playing());
            if element_playing != self.intent.playing && !self.element_ended() {
                warn!(
                    "Audio track {} unmatched playing state: should be {} instead of {}",
                    self.id, self.intent.playing, element_playing
                );
                self.reconcile_device();
                self.update_time(true);
            }
        }

        if let Some(reason) = self.stuck_reason() {
            if self.stuck.set(true) == Some(StuckEdge::BecameStuck) {
                self.log(&format!("Stuck, reason: {}", reason));
                if let Some(reporter) = &self.reporter {
                    reporter.report_stuck();
                }
            }
            return true;
        }

        if self.stuck.set(false) == Some(StuckEdge::BecameUnstuck) {
            self.log("Unstuck");
            if let Some(reporter) = &self.reporter {
                reporter.report_unstuck();
            }
        }

        let now = self.clock.now_ms();
        if self.intent.should_play()
            && is_stale(now, self.last_report_time, self.tuning.staleness_threshold_ms)
        {
            self.report_progress();
        }
        false
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        if let Some(mut adapter) = self.adapter.take() {
            adapter.cancel_pending();
        }
        self.reporter = None;
        info!("Audio track {} destroyed", self.id);
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
        if adapter.element().is_none() {
            return if adapter.has_pending_load() {
                TrackState::AttachedNotReady
            } else {
                TrackState::Unattached
            };
        }
        if self.element_ended() {
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
