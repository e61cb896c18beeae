//! Simulated audio output graph

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::device::{AudioElement, AudioMixer, AudioSource, AudioStation, ContextState};
use crate::error::DeviceError;
use tsync_common::timing::ms_to_secs;

#[derive(Debug)]
struct StationState {
    context: ContextState,
    resume_requests: usize,
    /// Clip durations by url (s)
    durations: HashMap<String, f64>,
    released_sources: Rc<Cell<usize>>,
    elements: Vec<Rc<RefCell<ElementState>>>,
    mixers: Vec<Rc<Cell<bool>>>,
}

#[derive(Debug)]
struct ElementState {
    url: String,
    time: f64,
    duration: Option<f64>,
    playing: bool,
    volume: f32,
    stuck: bool,
    reject_play: bool,
    seeks: Vec<f64>,
    dropped: bool,
    mixer_suspended: Rc<Cell<bool>>,
}

/// Shared output graph
///
/// Keeps every mixer and element it ever created so they can be driven and
/// inspected after being handed to a track. Clones share state.
#[derive(Debug, Clone)]
pub struct SimAudioStation {
    state: Rc<RefCell<StationState>>,
}

impl Default for SimAudioStation {
    fn default() -> Self {
        Self::new()
    }
}

impl SimAudioStation {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(StationState {
                context: ContextState::Running,
                resume_requests: 0,
                durations: HashMap::new(),
                released_sources: Rc::new(Cell::new(0)),
                elements: Vec::new(),
                mixers: Vec::new(),
            })),
        }
    }

    /// Decoded clip as a load would deliver it
    pub fn source(&self, url: &str, duration_secs: f64) -> Box<dyn AudioSource> {
        let mut s = self.state.borrow_mut();
        s.durations.insert(url.to_string(), duration_secs);
        Box::new(SimAudioSource {
            url: url.to_string(),
            released: Rc::clone(&s.released_sources),
        })
    }

    /// Move time forward; audible elements advance with it
    pub fn advance(&self, dt_ms: f64) {
        let s = self.state.borrow();
        if s.context != ContextState::Running {
            return;
        }
        for element in &s.elements {
            let mut e = element.borrow_mut();
            if e.dropped || !e.playing || e.stuck || e.mixer_suspended.get() {
                continue;
            }
            e.time += ms_to_secs(dt_ms);
            if let Some(d) = e.duration {
                if e.time >= d {
                    e.time = d;
                    e.playing = false;
                }
            }
        }
    }

    pub fn set_context_state(&self, context: ContextState) {
        self.state.borrow_mut().context = context;
    }

    /// Times a track asked the context to resume
    pub fn resume_requests(&self) -> usize {
        self.state.borrow().resume_requests
    }

    /// Sources dropped so far, installed or not
    pub fn released_sources(&self) -> usize {
        self.state.borrow().released_sources.get()
    }

    pub fn elements_created(&self) -> usize {
        self.state.borrow().elements.len()
    }

    /// Most recently created element
    pub fn last_element(&self) -> Option<SimAudioElementHandle> {
        self.state
            .borrow()
            .elements
            .last()
            .map(|state| SimAudioElementHandle {
                state: Rc::clone(state),
            })
    }

    /// True if the mixer created `index`-th is suspended
    pub fn mixer_suspended(&self, index: usize) -> Option<bool> {
        self.state.borrow().mixers.get(index).map(|m| m.get())
    }
}

impl AudioStation for SimAudioStation {
    fn context_state(&self) -> ContextState {
        self.state.borrow().context
    }

    fn resume_context(&self) {
        let mut s = self.state.borrow_mut();
        s.resume_requests += 1;
        if s.context == ContextState::Suspended {
            s.context = ContextState::Running;
        }
    }

    fn create_mixer(&self) -> Box<dyn AudioMixer> {
        let suspended = Rc::new(Cell::new(false));
        self.state.borrow_mut().mixers.push(Rc::clone(&suspended));
        Box::new(SimMixer {
            station: self.clone(),
            suspended,
        })
    }
}

struct SimMixer {
    station: SimAudioStation,
    suspended: Rc<Cell<bool>>,
}

impl AudioMixer for SimMixer {
    fn suspend(&mut self) {
        self.suspended.set(true);
    }

    fn resume(&mut self) {
        self.suspended.set(false);
    }

    fn is_suspended(&self) -> bool {
        self.suspended.get()
    }

    fn create_element(&mut self, source: Box<dyn AudioSource>) -> Box<dyn AudioElement> {
        let mut station = self.station.state.borrow_mut();
        let state = Rc::new(RefCell::new(ElementState {
            url: source.url().to_string(),
            time: 0.0,
            duration: station.durations.get(source.url()).copied(),
            playing: false,
            volume: 1.0,
            stuck: false,
            reject_play: false,
            seeks: Vec::new(),
            dropped: false,
            mixer_suspended: Rc::clone(&self.suspended),
        }));
        station.elements.push(Rc::clone(&state));
        Box::new(SimAudioElement {
            state,
            _source: source,
        })
    }
}

/// Decoded clip; counts its release on drop
pub struct SimAudioSource {
    url: String,
    released: Rc<Cell<usize>>,
}

impl AudioSource for SimAudioSource {
    fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for SimAudioSource {
    fn drop(&mut self) {
        self.released.set(self.released.get() + 1);
    }
}

struct SimAudioElement {
    state: Rc<RefCell<ElementState>>,
    _source: Box<dyn AudioSource>,
}

impl AudioElement for SimAudioElement {
    fn time(&self) -> f64 {
        self.state.borrow().time
    }

    fn set_time(&mut self, secs: f64) {
        let mut e = self.state.borrow_mut();
        e.seeks.push(secs);
        e.time = match e.duration {
            Some(d) => secs.min(d),
            None => secs,
        };
    }

    fn duration(&self) -> Option<f64> {
        self.state.borrow().duration
    }

    fn is_playing(&self) -> bool {
        self.state.borrow().playing
    }

    fn play(&mut self) -> Result<(), DeviceError> {
        let mut e = self.state.borrow_mut();
        if e.reject_play {
            return Err(DeviceError::PlayRejected(format!("{} refused to play", e.url)));
        }
        e.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.state.borrow_mut().playing = false;
    }

    fn set_volume(&mut self, volume: f32) {
        self.state.borrow_mut().volume = volume;
    }

    fn is_stuck(&self) -> bool {
        self.state.borrow().stuck
    }
}

impl Drop for SimAudioElement {
    fn drop(&mut self) {
        self.state.borrow_mut().dropped = true;
    }
}

/// Inspection handle for a created element
#[derive(Debug, Clone)]
pub struct SimAudioElementHandle {
    state: Rc<RefCell<ElementState>>,
}

impl SimAudioElementHandle {
    pub fn url(&self) -> String {
        self.state.borrow().url.clone()
    }

    pub fn time(&self) -> f64 {
        self.state.borrow().time
    }

    pub fn is_playing(&self) -> bool {
        self.state.borrow().playing
    }

    pub fn volume(&self) -> f32 {
        self.state.borrow().volume
    }

    /// Seeks issued by the track, in seconds
    pub fn seeks(&self) -> Vec<f64> {
        self.state.borrow().seeks.clone()
    }

    pub fn is_dropped(&self) -> bool {
        self.state.borrow().dropped
    }

    pub fn set_stuck(&self, stuck: bool) {
        self.state.borrow_mut().stuck = stuck;
    }

    pub fn reject_play(&self, reject: bool) {
        self.state.borrow_mut().reject_play = reject;
    }

    /// Stop the element from outside the track
    pub fn external_pause(&self) {
        self.state.borrow_mut().playing = false;
    }
}
