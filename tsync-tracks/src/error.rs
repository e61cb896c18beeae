//! Error types for tsync-tracks
//!
//! Device operations can fail for reasons outside our control (autoplay
//! policy, a torn-down element). Controllers catch every one of these and
//! degrade to stuck/paused/reloading; nothing here reaches the scheduler.

use thiserror::Error;

/// Failure reported by a playback device
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Platform refused to start playback (e.g. autoplay restrictions)
    #[error("Play rejected: {0}")]
    PlayRejected(String),

    /// Device handle no longer usable
    #[error("Device unavailable: {0}")]
    Unavailable(String),

    /// Anything else the platform raised
    #[error("Device error: {0}")]
    Other(String),
}

/// Main error type for tsync-tracks
#[derive(Error, Debug)]
pub enum Error {
    /// Track id already registered
    #[error("Track already attached: {0}")]
    DuplicateTrack(String),
}

/// Convenience Result type using tsync-tracks Error
pub type Result<T> = std::result::Result<T, Error>;
