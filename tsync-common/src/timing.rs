//! Clock model for track synchronization
//!
//! Three clocks are in play for every track:
//!
//! 1. **Scheduler time**: host monotonic milliseconds (`f64`), the wall clock
//!    the scheduler uses when it issues a logical clock sample
//! 2. **Progress**: logical playback position in milliseconds
//! 3. **Device position**: what the playback device reports, in seconds
//!
//! A logical clock sample `(time, progress)` asserts that at scheduler time
//! `time` the track was supposed to be at `progress`. Everything here is pure
//! arithmetic on those values; no function reads a clock on its own.
//!
//! # Examples
//!
//! ```rust
//! use tsync_common::timing::*;
//!
//! let sample = ClockSample::new(10_000.0, 1_000.0);
//!
//! // 50ms of wall time later the track should be 50ms further along
//! assert_eq!(sample.target_at(10_050.0), 1_050.0);
//!
//! // Device positions are seconds
//! assert_eq!(ms_to_secs(1_050.0), 1.05);
//! assert!(!exceeds_drift(1_050.0, 1_040.0, 33.0));
//! ```

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

// ============================================================================
// Conversions
// ============================================================================

/// Milliseconds per second
pub const MS_PER_SEC: f64 = 1000.0;

/// Convert a device position (seconds) to progress milliseconds
pub fn secs_to_ms(secs: f64) -> f64 {
    secs * MS_PER_SEC
}

/// Convert progress milliseconds to a device position (seconds)
pub fn ms_to_secs(ms: f64) -> f64 {
    ms / MS_PER_SEC
}

// ============================================================================
// Clock samples
// ============================================================================

/// Logical clock sample issued by the scheduler
///
/// Not stored long-term; each new sample supersedes the previous one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockSample {
    /// Scheduler time at which `progress` was valid (ms)
    pub time: f64,
    /// Intended playback position at `time` (ms)
    pub progress: f64,
}

impl ClockSample {
    pub fn new(time: f64, progress: f64) -> Self {
        Self { time, progress }
    }

    /// Device-local target position at scheduler time `now`
    ///
    /// `target = now - time + progress`
    pub fn target_at(&self, now: f64) -> f64 {
        now - self.time + self.progress
    }

    /// True when `other` was issued strictly before this sample
    pub fn supersedes(&self, other: &ClockSample) -> bool {
        self.time >= other.time
    }
}

/// Extrapolate progress forward from the last observation
pub fn extrapolate(progress: f64, since: f64, now: f64) -> f64 {
    progress + (now - since)
}

/// True when two positions disagree by more than `tolerance` (ms)
pub fn exceeds_drift(target: f64, current: f64, tolerance: f64) -> bool {
    (target - current).abs() > tolerance
}

/// True when the last observation is older than `threshold` (ms)
///
/// A missing observation is always stale.
pub fn is_stale(now: f64, last_update: Option<f64>, threshold: f64) -> bool {
    match last_update {
        Some(last) => now - last > threshold,
        None => true,
    }
}

/// True when an observed position grew enough to be trusted as motion
///
/// Device clocks report in coarse steps. An observation only counts as
/// progress when it moved by more than `ratio` of the elapsed wall time.
pub fn has_advanced(observed: f64, last: f64, elapsed: f64, ratio: f64) -> bool {
    observed - last > elapsed * ratio
}

// ============================================================================
// Clock sources
// ============================================================================

/// Source of scheduler time in milliseconds
///
/// Injected into every track controller so tests and the simulator can
/// drive time explicitly.
pub trait Clock {
    /// Current monotonic time in milliseconds
    fn now_ms(&self) -> f64;
}

/// Monotonic clock backed by `Instant`
///
/// Reports milliseconds elapsed since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * MS_PER_SEC
    }
}

/// Manually driven clock
///
/// Clones share the same underlying time, so a test can keep one handle and
/// give another to the controller under test.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    /// Set absolute time
    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }

    /// Move time forward by `ms`
    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}
