//! Platform recovery policies
//!
//! On some platforms a video element can get into a state where its
//! telemetry looks normal but seeks never take: the position reported after a
//! seek is nowhere near the seek target and the frame stays blank. The only
//! cure is reloading the element. Whether to watch for this is a capability
//! injected at construction, not a platform check buried in the controller.

use tsync_common::config::{RecoveryConfig, RecoveryMode, SyncTuning};

/// What the controller saw at the first progress report after a seek
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekObservation {
    /// Seek target (ms)
    pub target_ms: f64,
    /// Position reported by the device (ms)
    pub observed_ms: f64,
    /// Wall time since the seek was issued (ms)
    pub elapsed_ms: f64,
    /// Device was running at some point since the seek
    pub playing: bool,
}

impl SeekObservation {
    /// Positions a healthy device could report, `(low, high)` in ms
    ///
    /// A playing device may have advanced anywhere between zero (still
    /// buffering at the target) and the full elapsed time.
    pub fn plausible_window(&self) -> (f64, f64) {
        let advance = if self.playing {
            self.elapsed_ms.max(0.0)
        } else {
            0.0
        };
        (self.target_ms, self.target_ms + advance)
    }

    /// Distance from the observed position to the plausible window (ms)
    pub fn divergence_ms(&self) -> f64 {
        let (low, high) = self.plausible_window();
        if self.observed_ms < low {
            low - self.observed_ms
        } else if self.observed_ms > high {
            self.observed_ms - high
        } else {
            0.0
        }
    }
}

/// Outcome of a recovery assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Device looks healthy
    None,
    /// Reload the device from scratch
    ReloadDevice,
}

/// Pluggable recovery strategy
pub trait RecoveryPolicy {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Judge a seek against what the device reported afterward
    fn assess_seek(&self, observation: &SeekObservation) -> RecoveryAction;
}

/// Trust the device unconditionally
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustDevice;

impl RecoveryPolicy for TrustDevice {
    fn name(&self) -> &'static str {
        "trust-device"
    }

    fn assess_seek(&self, _observation: &SeekObservation) -> RecoveryAction {
        RecoveryAction::None
    }
}

/// Reload when a seek lands outside its plausible window
#[derive(Debug, Clone, Copy)]
pub struct ReloadOnStalledSeek {
    pub tolerance_ms: f64,
}

impl Default for ReloadOnStalledSeek {
    fn default() -> Self {
        Self {
            tolerance_ms: SyncTuning::default().stalled_seek_tolerance_ms,
        }
    }
}

impl RecoveryPolicy for ReloadOnStalledSeek {
    fn name(&self) -> &'static str {
        "reload-on-stalled-seek"
    }

    fn assess_seek(&self, observation: &SeekObservation) -> RecoveryAction {
        if observation.divergence_ms() > self.tolerance_ms {
            RecoveryAction::ReloadDevice
        } else {
            RecoveryAction::None
        }
    }
}

/// Build the policy a config asks for
pub fn policy_for(recovery: &RecoveryConfig, tuning: &SyncTuning) -> Box<dyn RecoveryPolicy> {
    match recovery.mode {
        RecoveryMode::None => Box::new(TrustDevice),
        RecoveryMode::ReloadOnStalledSeek => Box::new(ReloadOnStalledSeek {
            tolerance_ms: tuning.stalled_seek_tolerance_ms,
        }),
    }
}
