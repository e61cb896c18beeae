//! Playback device adapters
//!
//! A device is the platform media element a track drives: a buffered video
//! element or an audio element hanging off a shared output graph. The traits
//! here are the seam to the platform; the adapters wrap one device handle
//! each and add the bookkeeping the controllers need (readiness, load
//! generations).

pub mod audio;
pub mod video;

pub use audio::{
    AudioAdapter, AudioElement, AudioMixer, AudioSource, AudioStation, ContextState, Installed,
    LoadTicket,
};
pub use video::{VideoAdapter, VideoDevice};

use std::fmt;

/// Device readiness ordinal
///
/// Ordered: each level implies the previous ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ReadyState {
    /// Nothing known about the media
    #[default]
    Nothing,
    /// Duration and dimensions known; seeking may still misbehave
    Metadata,
    /// Data for the current position only
    CurrentData,
    /// Some data ahead of the current position
    FutureData,
    /// Device believes it can play through
    EnoughData,
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadyState::Nothing => write!(f, "nothing"),
            ReadyState::Metadata => write!(f, "metadata"),
            ReadyState::CurrentData => write!(f, "current-data"),
            ReadyState::FutureData => write!(f, "future-data"),
            ReadyState::EnoughData => write!(f, "enough-data"),
        }
    }
}

/// Half-open buffered interval `[start, end)` in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, position: f64) -> bool {
        self.start <= position && position < self.end
    }
}

/// Read-only snapshot of what a device reports
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceTelemetry {
    /// Current position (s)
    pub current_position: f64,
    /// Media duration (s), `None` until known
    pub duration: Option<f64>,
    pub paused: bool,
    pub ended: bool,
    pub seeking: bool,
    /// Ordered buffered ranges
    pub buffered: Vec<TimeRange>,
    pub ready_state: ReadyState,
}
