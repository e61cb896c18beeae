//! Track registry
//!
//! The scheduler registers tracks by id and drives them all on every tick.
//! Detaching a track destroys it; so does dropping the registry.

use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, info};
use tsync_common::events::TrackId;

use crate::error::{Error, Result};
use crate::track::{SharedTrack, Track};

#[derive(Default)]
pub struct TrackRegistry {
    tracks: HashMap<TrackId, SharedTrack>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a track under the id it reports
    ///
    /// Fails if the id is taken; the existing track is left untouched.
    pub fn attach(&mut self, track: SharedTrack) -> Result<SharedTrack> {
        let id = track.borrow().id().clone();
        if self.tracks.contains_key(&id) {
            return Err(Error::DuplicateTrack(id.to_string()));
        }
        info!("Track {} attached", id);
        self.tracks.insert(id, Rc::clone(&track));
        Ok(track)
    }

    /// Unregister and destroy a track
    ///
    /// Returns false if no track had that id.
    pub fn detach(&mut self, id: &TrackId) -> bool {
        match self.tracks.remove(id) {
            Some(track) => {
                track.borrow_mut().destroy();
                info!("Track {} detached", id);
                true
            }
            None => {
                debug!("Detach of unknown track {}", id);
                false
            }
        }
    }

    pub fn get(&self, id: &TrackId) -> Option<SharedTrack> {
        self.tracks.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &TrackId> {
        self.tracks.keys()
    }

    pub fn play_all(&self) {
        self.for_each(|t| t.play());
    }

    pub fn pause_all(&self) {
        self.for_each(|t| t.pause());
    }

    pub fn suspend_all(&self) {
        self.for_each(|t| t.suspend());
    }

    pub fn resume_all(&self) {
        self.for_each(|t| t.resume());
    }

    pub fn sync_all(&self, progress: f64, time: f64) {
        self.for_each(|t| t.sync(progress, time));
    }

    /// Tick every track; true if any of them is stuck
    pub fn update_all(&self, time: f64, progress: f64) -> bool {
        let mut stuck = false;
        for track in self.tracks.values() {
            stuck |= track.borrow_mut().update(time, progress);
        }
        stuck
    }

    fn for_each(&self, mut f: impl FnMut(&mut dyn Track)) {
        for track in self.tracks.values() {
            f(&mut *track.borrow_mut());
        }
    }
}

impl Drop for TrackRegistry {
    fn drop(&mut self) {
        for (id, track) in self.tracks.drain() {
            track.borrow_mut().destroy();
            debug!("Track {} destroyed with registry", id);
        }
    }
}
