//! Scheduler play intent as a pure state machine
//!
//! The scheduler drives two orthogonal flags per track: play/pause and
//! suspend/resume. Suspend always wins. Transitions are pure functions
//! returning the device effects the controller must carry out, so the
//! state machine can be tested without any device.

/// Scheduler-intended playback flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayIntent {
    /// Scheduler asked to play
    pub playing: bool,
    /// Scheduler asked to suspend (orthogonal to `playing`)
    pub suspended: bool,
}

impl PlayIntent {
    /// Effective "device should be playing" predicate
    pub fn should_play(&self) -> bool {
        self.playing && !self.suspended
    }
}

/// Imperative controls from the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentEvent {
    Play,
    Pause,
    Suspend,
    Resume,
}

/// Side effects a transition asks the controller to perform, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEffect {
    /// Start the device if it can play
    StartDevice,
    /// Pause the device
    PauseDevice,
    /// Drop the drift-free sync timestamp so later checks do not assume motion
    ForgetSyncTime,
    /// Push current progress to the scheduler
    ReportProgress,
}

/// Apply one scheduler control to the intent
///
/// Every control ends with `ReportProgress`. Device effects are only emitted
/// when the effective play state may have changed:
///
/// | event   | flag change        | device effects (if ...)            |
/// |---------|--------------------|------------------------------------|
/// | Play    | playing = true     | start (not suspended)              |
/// | Pause   | playing = false    | forget + pause (not suspended)     |
/// | Resume  | suspended = false  | start (playing)                    |
/// | Suspend | suspended = true   | forget + pause (playing)           |
pub fn transition(intent: PlayIntent, event: IntentEvent) -> (PlayIntent, Vec<DeviceEffect>) {
    let mut next = intent;
    let mut effects = Vec::with_capacity(3);

    match event {
        IntentEvent::Play => {
            next.playing = true;
            if !next.suspended {
                effects.push(DeviceEffect::StartDevice);
            }
        }
        IntentEvent::Pause => {
            next.playing = false;
            if !next.suspended {
                effects.push(DeviceEffect::ForgetSyncTime);
                effects.push(DeviceEffect::PauseDevice);
            }
        }
        IntentEvent::Resume => {
            next.suspended = false;
            if next.playing {
                effects.push(DeviceEffect::StartDevice);
            }
        }
        IntentEvent::Suspend => {
            next.suspended = true;
            if next.playing {
                effects.push(DeviceEffect::ForgetSyncTime);
                effects.push(DeviceEffect::PauseDevice);
            }
        }
    }

    effects.push(DeviceEffect::ReportProgress);
    (next, effects)
}
