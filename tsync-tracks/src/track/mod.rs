//! Track controllers
//!
//! One controller per playable track, all speaking the same protocol to the
//! scheduler. The scheduler pushes its logical clock through `update()` on
//! every tick and issues imperative controls in between; the controller
//! keeps its device in line and answers whether the track is stuck.
//!
//! Controllers are single-threaded: every call runs to completion before the
//! next one, and asynchronous completions (device readiness, resource loads)
//! arrive as ordinary calls between them.

pub mod audio;
pub mod loader;
pub mod video;

pub use audio::AudioTrack;
pub use loader::{spawn_audio_load, AudioLoad};
pub use video::VideoTrack;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tsync_common::events::TrackId;

/// Uniform track protocol consumed by the scheduler
///
/// Times are scheduler milliseconds, progress is logical milliseconds. Every
/// method is a safe no-op once the track is destroyed.
pub trait Track {
    fn id(&self) -> &TrackId;

    /// Scheduler wants the track playing
    fn play(&mut self);

    /// Scheduler wants the track paused
    fn pause(&mut self);

    /// Lift a suspension, re-applying the play intent
    fn resume(&mut self);

    /// Silence the track while remembering the play intent
    fn suspend(&mut self);

    /// Out-of-band seek: the track should have been at `progress` at `time`
    fn sync(&mut self, progress: f64, time: f64);

    /// Steady tick; returns true when the track cannot keep up
    fn update(&mut self, time: f64, progress: f64) -> bool;

    /// Release the device and cancel pending work; idempotent
    fn destroy(&mut self);

    /// Derived lifecycle state
    fn state(&self) -> TrackState;
}

/// Shared handle the registry and async completions hold
pub type SharedTrack = Rc<RefCell<dyn Track>>;

/// Derived controller state
///
/// Never stored; computed from the controller's fields on demand.
/// `Destroyed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// No device
    Unattached,
    /// Device present but not yet able to seek/play reliably
    AttachedNotReady,
    Playing,
    Paused,
    Suspended,
    /// Waiting for data
    Stuck,
    Ended,
    Destroyed,
}

impl fmt::Display for TrackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackState::Unattached => write!(f, "unattached"),
            TrackState::AttachedNotReady => write!(f, "attached-not-ready"),
            TrackState::Playing => write!(f, "playing"),
            TrackState::Paused => write!(f, "paused"),
            TrackState::Suspended => write!(f, "suspended"),
            TrackState::Stuck => write!(f, "stuck"),
            TrackState::Ended => write!(f, "ended"),
            TrackState::Destroyed => write!(f, "destroyed"),
        }
    }
}
