//! # Track Synchronization Engine (tsync-tracks)
//!
//! Keeps independently driven playback devices locked to one logical clock
//! supplied by an external scheduler.
//!
//! **Purpose:** Drive a buffered video element and a mixer-backed audio
//! element from the scheduler's `(time, progress)` samples, detect when a
//! device cannot keep up, and recover from platform failure modes.
//!
//! **Architecture:** Single-threaded controllers behind a uniform `Track`
//! protocol. Devices sit behind traits; asynchronous audio loads run on a
//! tokio `LocalSet` and are cancelled by generation counters.

pub mod detector;
pub mod device;
pub mod error;
pub mod intent;
pub mod recovery;
pub mod registry;
pub mod reporter;
pub mod sim;
pub mod track;

pub use error::{DeviceError, Error, Result};
pub use registry::TrackRegistry;
pub use reporter::{ChannelReporter, RecordingReporter, TrackReporter};
pub use track::{AudioTrack, SharedTrack, Track, TrackState, VideoTrack};
