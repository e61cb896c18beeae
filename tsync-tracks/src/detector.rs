//! Stuck/buffer detection
//!
//! Decides from device telemetry whether a track has enough data buffered to
//! keep playing, and if not, why. Reasons are diagnostic only; the caller's
//! control flow depends on `has_enough_buffer` alone.
//!
//! # Buffer Policy
//!
//! Enough buffer means the range containing the current position reaches
//! `min(duration - end_margin, position + lookahead)`: either near the end of
//! the media or `lookahead` seconds ahead.
//!
//! The device's readiness ordinal is advisory. `EnoughData` short-circuits
//! to true, except when the device reports buffered ranges and none of them
//! covers the current position. Some platforms stop updating buffered ranges
//! while holding plenty of data, so an empty range list is not held against
//! an `EnoughData` device.

use crate::device::{DeviceTelemetry, ReadyState, VideoDevice};
use tsync_common::config::SyncTuning;
use tsync_common::events::StuckReason;

/// Buffer lookahead requirements (seconds)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferPolicy {
    pub lookahead_secs: f64,
    pub end_margin_secs: f64,
}

impl Default for BufferPolicy {
    fn default() -> Self {
        Self::from(&SyncTuning::default())
    }
}

impl From<&SyncTuning> for BufferPolicy {
    fn from(tuning: &SyncTuning) -> Self {
        Self {
            lookahead_secs: tuning.buffer_lookahead_secs,
            end_margin_secs: tuning.buffer_end_margin_secs,
        }
    }
}

impl BufferPolicy {
    /// Position the buffered range must reach (s)
    pub fn required_end(&self, position: f64, duration: Option<f64>) -> f64 {
        let lookahead = position + self.lookahead_secs;
        match duration.filter(|d| d.is_finite()) {
            Some(d) => (d - self.end_margin_secs).min(lookahead),
            None => lookahead,
        }
    }

    /// Decide whether the device can keep playing
    pub fn has_enough_buffer(&self, telemetry: &DeviceTelemetry) -> bool {
        let position = telemetry.current_position;
        let covering = telemetry.buffered.iter().find(|r| r.contains(position));

        if telemetry.ready_state >= ReadyState::EnoughData {
            return covering.is_some() || telemetry.buffered.is_empty();
        }

        match covering {
            Some(range) => range.end >= self.required_end(position, telemetry.duration),
            None => false,
        }
    }
}

/// Why a device with too little buffer is stuck
///
/// Never empty: falls back to `Unknown` when telemetry shows no cause, which
/// happens with noisy telemetry (a seek that already finished, say).
pub fn stuck_reasons(telemetry: &DeviceTelemetry) -> Vec<StuckReason> {
    let mut reasons = Vec::new();
    if telemetry.seeking {
        reasons.push(StuckReason::Seeking);
    }
    if telemetry.ready_state <= ReadyState::CurrentData {
        reasons.push(StuckReason::InsufficientData);
    }
    if reasons.is_empty() {
        reasons.push(StuckReason::Unknown);
    }
    reasons
}

/// Join reasons for a log line
pub fn describe(reasons: &[StuckReason]) -> String {
    reasons
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Re-assign the device's position to itself
///
/// Some devices only refresh their readiness once touched. Skipped while a
/// seek is in flight. Returns true if the device was nudged.
pub fn nudge(device: &mut dyn VideoDevice) -> bool {
    if device.seeking() {
        return false;
    }
    let position = device.current_time();
    device.set_current_time(position);
    true
}

/// Stuck edge reported by `StuckLatch`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StuckEdge {
    BecameStuck,
    BecameUnstuck,
}

/// Remembers the last stuck flag so reports are edge-triggered
#[derive(Debug, Clone, Copy, Default)]
pub struct StuckLatch {
    stuck: bool,
}

impl StuckLatch {
    pub fn is_stuck(&self) -> bool {
        self.stuck
    }

    /// Record the current flag and return the edge, if any
    pub fn set(&mut self, stuck: bool) -> Option<StuckEdge> {
        let previous = std::mem::replace(&mut self.stuck, stuck);
        match (previous, stuck) {
            (false, true) => Some(StuckEdge::BecameStuck),
            (true, false) => Some(StuckEdge::BecameUnstuck),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.stuck = false;
    }
}
