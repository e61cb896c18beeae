//! Video device seam and adapter

use super::{DeviceTelemetry, ReadyState, TimeRange};
use crate::error::DeviceError;
use tsync_common::timing::{ms_to_secs, secs_to_ms};

/// Buffered media element as seen by the controller
///
/// Positions and durations are in seconds, matching what media elements
/// report. Everything except the position setter is telemetry.
pub trait VideoDevice {
    /// Current position (s)
    fn current_time(&self) -> f64;

    /// Issue a seek (s)
    fn set_current_time(&mut self, secs: f64);

    /// Media duration (s), `None` until metadata is known
    fn duration(&self) -> Option<f64>;

    fn paused(&self) -> bool;

    fn ended(&self) -> bool;

    fn seeking(&self) -> bool;

    fn ready_state(&self) -> ReadyState;

    /// Ordered buffered ranges
    fn buffered(&self) -> Vec<TimeRange>;

    /// Start playback; the platform may refuse
    fn play(&mut self) -> Result<(), DeviceError>;

    fn pause(&mut self);

    /// Reload the media from scratch
    fn load(&mut self);

    /// Snapshot of all telemetry at once
    fn telemetry(&self) -> DeviceTelemetry {
        DeviceTelemetry {
            current_position: self.current_time(),
            duration: self.duration(),
            paused: self.paused(),
            ended: self.ended(),
            seeking: self.seeking(),
            buffered: self.buffered(),
            ready_state: self.ready_state(),
        }
    }
}

/// One attached video device plus its readiness flag
///
/// "Ready" is stronger than "metadata loaded": some platforms accept a seek
/// while metadata is known but data is not, and end up with a position that
/// never moves again. The controller only seeks once the adapter is ready.
pub struct VideoAdapter {
    device: Box<dyn VideoDevice>,
    ready: bool,
}

impl VideoAdapter {
    pub fn new(device: Box<dyn VideoDevice>) -> Self {
        Self {
            device,
            ready: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Mark ready; returns true only on the not-ready to ready edge
    pub fn mark_ready(&mut self) -> bool {
        let edge = !self.ready;
        self.ready = true;
        edge
    }

    /// Reload the device and forget readiness
    pub fn reload(&mut self) {
        self.device.load();
        self.ready = false;
    }

    /// Device is actually producing frames
    ///
    /// Position past zero, not paused, not ended, and more than the current
    /// frame buffered.
    pub fn is_playing(&self) -> bool {
        self.device.current_time() > 0.0
            && !self.device.paused()
            && !self.device.ended()
            && self.device.ready_state() > ReadyState::CurrentData
    }

    /// Current position in progress milliseconds
    pub fn position_ms(&self) -> f64 {
        secs_to_ms(self.device.current_time())
    }

    /// Seek to a progress position in milliseconds
    pub fn seek_ms(&mut self, target_ms: f64) {
        self.device.set_current_time(ms_to_secs(target_ms));
    }

    /// Duration in progress milliseconds, once metadata is known
    pub fn duration_ms(&self) -> Option<f64> {
        if self.device.ready_state() < ReadyState::Metadata {
            return None;
        }
        self.device
            .duration()
            .filter(|d| d.is_finite())
            .map(secs_to_ms)
    }

    pub fn device(&self) -> &dyn VideoDevice {
        self.device.as_ref()
    }

    pub fn device_mut(&mut self) -> &mut dyn VideoDevice {
        self.device.as_mut()
    }
}
