//! Simulated video element

use std::cell::RefCell;
use std::rc::Rc;

use crate::device::{ReadyState, TimeRange, VideoDevice};
use crate::error::DeviceError;
use tsync_common::timing::ms_to_secs;

#[derive(Debug, Clone)]
struct SimVideoState {
    position: f64,
    duration: Option<f64>,
    paused: bool,
    ended: bool,
    seeking: bool,
    ready_state: ReadyState,
    buffered: Vec<TimeRange>,
    reject_play: bool,
    /// Telemetry looks fine but seeks and playback never move the position
    broken: bool,
    seeks: Vec<f64>,
    play_calls: usize,
    pause_calls: usize,
    load_count: usize,
}

/// Shared-state video element
///
/// Starts paused at zero with nothing loaded. Clones share state.
#[derive(Debug, Clone)]
pub struct SimVideo {
    state: Rc<RefCell<SimVideoState>>,
}

impl SimVideo {
    pub fn new(duration_secs: f64) -> Self {
        Self {
            state: Rc::new(RefCell::new(SimVideoState {
                position: 0.0,
                duration: Some(duration_secs),
                paused: true,
                ended: false,
                seeking: false,
                ready_state: ReadyState::Nothing,
                buffered: Vec::new(),
                reject_play: false,
                broken: false,
                seeks: Vec::new(),
                play_calls: 0,
                pause_calls: 0,
                load_count: 0,
            })),
        }
    }

    /// Boxed clone for handing to a track
    pub fn boxed(&self) -> Box<dyn VideoDevice> {
        Box::new(self.clone())
    }

    /// Whole media buffered and readiness at `EnoughData`
    pub fn make_ready(&self) {
        let mut s = self.state.borrow_mut();
        s.ready_state = ReadyState::EnoughData;
        s.buffered = match s.duration {
            Some(d) => vec![TimeRange::new(0.0, d)],
            None => Vec::new(),
        };
    }

    /// Move simulated time forward; a playing element advances with it
    pub fn advance(&self, dt_ms: f64) {
        let mut s = self.state.borrow_mut();
        if s.paused || s.ended || s.broken || s.seeking {
            return;
        }
        s.position += ms_to_secs(dt_ms);
        if let Some(d) = s.duration {
            if s.position >= d {
                s.position = d;
                s.ended = true;
            }
        }
    }

    pub fn set_buffered(&self, ranges: &[(f64, f64)]) {
        self.state.borrow_mut().buffered =
            ranges.iter().map(|&(s, e)| TimeRange::new(s, e)).collect();
    }

    pub fn set_ready_state(&self, ready_state: ReadyState) {
        self.state.borrow_mut().ready_state = ready_state;
    }

    pub fn set_seeking(&self, seeking: bool) {
        self.state.borrow_mut().seeking = seeking;
    }

    pub fn set_duration(&self, duration_secs: Option<f64>) {
        self.state.borrow_mut().duration = duration_secs;
    }

    /// Make the platform refuse `play()`
    pub fn reject_play(&self, reject: bool) {
        self.state.borrow_mut().reject_play = reject;
    }

    /// Pause from outside, the way an OS pauses background media
    pub fn external_pause(&self) {
        self.state.borrow_mut().paused = true;
    }

    /// Freeze the element until the next `load()`
    pub fn break_device(&self) {
        self.state.borrow_mut().broken = true;
    }

    pub fn position(&self) -> f64 {
        self.state.borrow().position
    }

    pub fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    /// Every seek issued, in seconds
    pub fn seeks(&self) -> Vec<f64> {
        self.state.borrow().seeks.clone()
    }

    pub fn play_calls(&self) -> usize {
        self.state.borrow().play_calls
    }

    pub fn pause_calls(&self) -> usize {
        self.state.borrow().pause_calls
    }

    pub fn load_count(&self) -> usize {
        self.state.borrow().load_count
    }
}

impl VideoDevice for SimVideo {
    fn current_time(&self) -> f64 {
        self.state.borrow().position
    }

    fn set_current_time(&mut self, secs: f64) {
        let mut s = self.state.borrow_mut();
        s.seeks.push(secs);
        if s.broken {
            return;
        }
        s.position = secs;
        s.ended = s.duration.is_some_and(|d| secs >= d);
    }

    fn duration(&self) -> Option<f64> {
        self.state.borrow().duration
    }

    fn paused(&self) -> bool {
        self.state.borrow().paused
    }

    fn ended(&self) -> bool {
        self.state.borrow().ended
    }

    fn seeking(&self) -> bool {
        self.state.borrow().seeking
    }

    fn ready_state(&self) -> ReadyState {
        self.state.borrow().ready_state
    }

    fn buffered(&self) -> Vec<TimeRange> {
        self.state.borrow().buffered.clone()
    }

    fn play(&mut self) -> Result<(), DeviceError> {
        let mut s = self.state.borrow_mut();
        s.play_calls += 1;
        if s.reject_play {
            return Err(DeviceError::PlayRejected(
                "autoplay blocked by platform policy".to_string(),
            ));
        }
        s.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        let mut s = self.state.borrow_mut();
        s.pause_calls += 1;
        s.paused = true;
    }

    fn load(&mut self) {
        let mut s = self.state.borrow_mut();
        s.load_count += 1;
        s.broken = false;
        s.position = 0.0;
        s.paused = true;
        s.ended = false;
        s.seeking = false;
        s.ready_state = ReadyState::Nothing;
        s.buffered.clear();
    }
}
