//! Audio device seam and adapter
//!
//! Audio goes through a shared output graph (the station). Each track owns a
//! mixer node on that graph and at most one element playing a decoded source
//! through it. Suspend/resume act on the mixer, play/pause on the element.

use crate::error::DeviceError;
use std::rc::Rc;
use tracing::debug;

/// State of the shared output context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    Suspended,
    Closed,
}

/// Shared audio output graph
///
/// Shared by every audio track; all methods take `&self`.
pub trait AudioStation {
    fn context_state(&self) -> ContextState;

    /// Ask a suspended context to resume
    fn resume_context(&self);

    /// Create a mixer node for one track
    fn create_mixer(&self) -> Box<dyn AudioMixer>;
}

/// Per-track mixer node on the shared graph
pub trait AudioMixer {
    fn suspend(&mut self);

    fn resume(&mut self);

    fn is_suspended(&self) -> bool;

    /// Create an element playing `source` through this mixer
    fn create_element(&mut self, source: Box<dyn AudioSource>) -> Box<dyn AudioElement>;
}

/// Decoded audio ready to be played
///
/// Resources are released when the source is dropped.
pub trait AudioSource {
    /// Where the data came from; used to skip reloading the same clip
    fn url(&self) -> &str;
}

/// Playing instance of a source
pub trait AudioElement {
    /// Current position (s)
    fn time(&self) -> f64;

    /// Seek (s)
    fn set_time(&mut self, secs: f64);

    /// Clip duration (s), if known
    fn duration(&self) -> Option<f64>;

    fn is_playing(&self) -> bool;

    fn play(&mut self) -> Result<(), DeviceError>;

    fn pause(&mut self);

    fn set_volume(&mut self, volume: f32);

    /// Element reports it cannot make progress
    fn is_stuck(&self) -> bool;
}

/// Identity of one load request
///
/// A completion is applied only if its ticket's generation is still the
/// adapter's pending generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// What happened when a loaded source was installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Installed {
    /// New element created from the source
    Replaced,
    /// Source had the current url; it was released and the element kept
    SameUrl,
}

/// One track's mixer, element and load bookkeeping
pub struct AudioAdapter {
    station: Rc<dyn AudioStation>,
    mixer: Box<dyn AudioMixer>,
    element: Option<Box<dyn AudioElement>>,
    url: Option<String>,
    generation: u64,
    pending: Option<u64>,
}

impl AudioAdapter {
    pub fn new(station: Rc<dyn AudioStation>) -> Self {
        let mixer = station.create_mixer();
        Self {
            station,
            mixer,
            element: None,
            url: None,
            generation: 0,
            pending: None,
        }
    }

    /// Start a new load, superseding any in flight
    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        self.pending = Some(self.generation);
        LoadTicket {
            generation: self.generation,
        }
    }

    /// True if `ticket` is the load the adapter is waiting for
    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        self.pending == Some(ticket.generation)
    }

    pub fn has_pending_load(&self) -> bool {
        self.pending.is_some()
    }

    /// Forget any in-flight load; its completion becomes a no-op
    pub fn cancel_pending(&mut self) {
        if self.pending.take().is_some() {
            self.generation += 1;
        }
    }

    /// Mark the pending load finished
    pub fn complete_load(&mut self) {
        self.pending = None;
    }

    /// Install a loaded source, releasing it if it matches the current url
    pub fn install(&mut self, source: Box<dyn AudioSource>, volume: f32) -> Installed {
        if self.url.as_deref() == Some(source.url()) {
            debug!("Audio source {} already loaded, releasing duplicate", source.url());
            return Installed::SameUrl;
        }
        self.url = Some(source.url().to_string());
        // Old element goes first so two never play at once
        self.element = None;
        let mut element = self.mixer.create_element(source);
        element.set_volume(volume);
        self.element = Some(element);
        Installed::Replaced
    }

    /// Drop the element and forget its url
    pub fn unload(&mut self) {
        self.element = None;
        self.url = None;
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn element(&self) -> Option<&dyn AudioElement> {
        self.element.as_deref()
    }

    pub fn element_mut(&mut self) -> Option<&mut (dyn AudioElement + 'static)> {
        self.element.as_deref_mut()
    }

    pub fn mixer(&self) -> &dyn AudioMixer {
        self.mixer.as_ref()
    }

    pub fn mixer_mut(&mut self) -> &mut dyn AudioMixer {
        self.mixer.as_mut()
    }

    pub fn station(&self) -> &dyn AudioStation {
        self.station.as_ref()
    }

    pub fn context_running(&self) -> bool {
        self.station.context_state() == ContextState::Running
    }

    /// Element playing, mixer not suspended, and the context running
    pub fn is_audible(&self) -> bool {
        self.element.as_ref().is_some_and(|e| e.is_playing())
            && !self.mixer.is_suspended()
            && self.context_running()
    }
}
