//! Asynchronous audio loads
//!
//! A load runs on the current `LocalSet` and holds only a weak reference to
//! its track, so a destroyed or dropped track never keeps a load alive and a
//! late completion has nothing to touch.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use futures::future::LocalBoxFuture;
use tokio::task::JoinHandle;
use tracing::debug;

use super::AudioTrack;
use crate::device::AudioSource;

/// Future resolving to decoded audio, or `None` to clear the track
pub type AudioLoad = LocalBoxFuture<'static, Option<Box<dyn AudioSource>>>;

/// Start loading `load` into `track`
///
/// Must be called from within a `tokio::task::LocalSet`. Returns `None` when
/// the track is already destroyed. Starting another load supersedes this one;
/// its result is then released without touching the track.
pub fn spawn_audio_load(track: &Rc<RefCell<AudioTrack>>, load: AudioLoad) -> Option<JoinHandle<()>> {
    let ticket = track.borrow_mut().begin_load()?;
    let weak: Weak<RefCell<AudioTrack>> = Rc::downgrade(track);

    Some(tokio::task::spawn_local(async move {
        let source = load.await;
        match weak.upgrade() {
            Some(track) => track.borrow_mut().finish_load(ticket, source),
            None => debug!("Audio load {} finished after track dropped", ticket.generation()),
        }
    }))
}
