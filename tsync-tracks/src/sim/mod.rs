//! Simulated devices
//!
//! In-memory stand-ins for the platform media elements, used by the
//! simulator binary and the tests. Every simulated device shares its state
//! with cloned handles, so a caller can keep a handle, give the device to a
//! track, and then drive time and inspect what the track did to it.
//!
//! Simulated time only moves through `advance`, in milliseconds, matching
//! the clock the tracks are given.

pub mod audio;
pub mod scenario;
pub mod video;

pub use audio::{SimAudioElementHandle, SimAudioSource, SimAudioStation};
pub use video::SimVideo;
pub use scenario::{ScenarioOptions, ScenarioSummary};
