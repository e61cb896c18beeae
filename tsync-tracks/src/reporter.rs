//! Reporting channel from a track back to the scheduler
//!
//! Every method is infallible and non-blocking. A reporter belongs to one
//! track; controllers drop it on `destroy()` so nothing can be reported
//! afterward.

use std::cell::RefCell;
use std::rc::Rc;
use tokio::sync::broadcast;
use tracing::debug;
use tsync_common::events::{ContentState, ReportEvent, ReportRecord, TrackId};

/// Callbacks a track uses to talk to the scheduler
pub trait TrackReporter {
    /// Push current authoritative progress (ms)
    fn report_progress(&self, progress_ms: f64);

    /// Track started waiting for data (edge-triggered)
    fn report_stuck(&self);

    /// Track can play again (edge-triggered)
    fn report_unstuck(&self);

    /// Natural end of track
    fn finish_itself(&self);

    /// Lifecycle hint
    fn update_content_state(&self, state: ContentState);

    /// Diagnostic message
    fn log(&self, message: &str);
}

/// One reporter callback, before it is tagged with a track
enum Call<'a> {
    Progress(f64),
    Stuck,
    Unstuck,
    Finished,
    ContentState(ContentState),
    Log(&'a str),
}

/// Build the event a callback corresponds to
fn event_for(track_id: &TrackId, call: Call<'_>) -> ReportEvent {
    let track_id = track_id.clone();
    match call {
        Call::Progress(progress_ms) => ReportEvent::Progress {
            track_id,
            progress_ms,
        },
        Call::Stuck => ReportEvent::Stuck { track_id },
        Call::Unstuck => ReportEvent::Unstuck { track_id },
        Call::Finished => ReportEvent::Finished { track_id },
        Call::ContentState(state) => ReportEvent::ContentState { track_id, state },
        Call::Log(message) => ReportEvent::Log {
            track_id,
            message: message.to_string(),
        },
    }
}

/// Reporter that publishes onto a broadcast channel
///
/// Uses tokio::broadcast internally: publishing never blocks, and having no
/// subscribers is fine.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    track_id: TrackId,
    tx: broadcast::Sender<ReportRecord>,
}

impl ChannelReporter {
    pub fn new(track_id: TrackId, tx: broadcast::Sender<ReportRecord>) -> Self {
        Self { track_id, tx }
    }

    /// Create a channel with the given capacity and a reporter on it
    pub fn channel(track_id: TrackId, capacity: usize) -> (Self, broadcast::Receiver<ReportRecord>) {
        let (tx, rx) = broadcast::channel(capacity);
        (Self::new(track_id, tx), rx)
    }

    /// Reporter for another track on the same channel
    pub fn for_track(&self, track_id: TrackId) -> Self {
        Self::new(track_id, self.tx.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReportRecord> {
        self.tx.subscribe()
    }

    fn publish(&self, call: Call<'_>) {
        let event = event_for(&self.track_id, call);
        // Ignore send errors (no receivers is OK)
        if self.tx.send(ReportRecord::now(event)).is_err() {
            debug!("No subscribers for track {} report", self.track_id);
        }
    }
}

impl TrackReporter for ChannelReporter {
    fn report_progress(&self, progress_ms: f64) {
        self.publish(Call::Progress(progress_ms));
    }

    fn report_stuck(&self) {
        self.publish(Call::Stuck);
    }

    fn report_unstuck(&self) {
        self.publish(Call::Unstuck);
    }

    fn finish_itself(&self) {
        self.publish(Call::Finished);
    }

    fn update_content_state(&self, state: ContentState) {
        self.publish(Call::ContentState(state));
    }

    fn log(&self, message: &str) {
        self.publish(Call::Log(message));
    }
}

/// Reporter that keeps every event in memory
///
/// Clones share the same record list.
#[derive(Debug, Clone)]
pub struct RecordingReporter {
    track_id: TrackId,
    records: Rc<RefCell<Vec<ReportRecord>>>,
}

impl RecordingReporter {
    pub fn new(track_id: TrackId) -> Self {
        Self {
            track_id,
            records: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn push(&self, call: Call<'_>) {
        let event = event_for(&self.track_id, call);
        self.records.borrow_mut().push(ReportRecord::now(event));
    }

    /// All events so far, oldest first
    pub fn events(&self) -> Vec<ReportEvent> {
        self.records.borrow().iter().map(|r| r.event.clone()).collect()
    }

    /// Progress values reported so far
    pub fn progress_reports(&self) -> Vec<f64> {
        self.records
            .borrow()
            .iter()
            .filter_map(|r| match r.event {
                ReportEvent::Progress { progress_ms, .. } => Some(progress_ms),
                _ => None,
            })
            .collect()
    }

    /// Last reported progress, if any
    pub fn last_progress(&self) -> Option<f64> {
        self.progress_reports().last().copied()
    }

    /// Number of events matching a predicate
    pub fn count(&self, predicate: impl Fn(&ReportEvent) -> bool) -> usize {
        self.records
            .borrow()
            .iter()
            .filter(|r| predicate(&r.event))
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.records.borrow_mut().clear();
    }
}

impl TrackReporter for RecordingReporter {
    fn report_progress(&self, progress_ms: f64) {
        self.push(Call::Progress(progress_ms));
    }

    fn report_stuck(&self) {
        self.push(Call::Stuck);
    }

    fn report_unstuck(&self) {
        self.push(Call::Unstuck);
    }

    fn finish_itself(&self) {
        self.push(Call::Finished);
    }

    fn update_content_state(&self, state: ContentState) {
        self.push(Call::ContentState(state));
    }

    fn log(&self, message: &str) {
        self.push(Call::Log(message));
    }
}
