//! Event types for the track reporting channel
//!
//! A track talks back to the scheduler through a small set of callbacks
//! (progress, stuck/unstuck, finish, content state, log). These types give
//! each callback a serializable shape so reporters can publish, record, or
//! print them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier the scheduler registered a track under
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Lifecycle hint sent to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentState {
    /// Device attached or resource loading, not yet playable
    Preloading,
    /// Enough data buffered to play
    Ready,
}

impl fmt::Display for ContentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentState::Preloading => write!(f, "preloading"),
            ContentState::Ready => write!(f, "ready"),
        }
    }
}

/// Why a track could not keep playing
///
/// Diagnostic only; never changes control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StuckReason {
    /// Device is mid-seek
    Seeking,
    /// Device readiness at or below current-data
    InsufficientData,
    /// Resource load pending, nothing to play yet
    NotLoaded,
    /// Device reports it stopped making progress
    DeviceStalled,
    /// Buffer check failed but telemetry shows no cause
    Unknown,
}

impl fmt::Display for StuckReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StuckReason::Seeking => write!(f, "seeking"),
            StuckReason::InsufficientData => write!(f, "insufficient-data"),
            StuckReason::NotLoaded => write!(f, "not-loaded"),
            StuckReason::DeviceStalled => write!(f, "device-stalled"),
            StuckReason::Unknown => write!(f, "unknown"),
        }
    }
}

/// One reporter callback, tagged with the track that issued it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportEvent {
    /// Current authoritative progress (ms)
    Progress { track_id: TrackId, progress_ms: f64 },

    /// Track started waiting for data
    Stuck { track_id: TrackId },

    /// Track can play again
    Unstuck { track_id: TrackId },

    /// Natural end of track (seek target beyond duration)
    Finished { track_id: TrackId },

    /// Lifecycle hint
    ContentState {
        track_id: TrackId,
        state: ContentState,
    },

    /// Diagnostic message
    Log { track_id: TrackId, message: String },
}

impl ReportEvent {
    pub fn track_id(&self) -> &TrackId {
        match self {
            ReportEvent::Progress { track_id, .. }
            | ReportEvent::Stuck { track_id }
            | ReportEvent::Unstuck { track_id }
            | ReportEvent::Finished { track_id }
            | ReportEvent::ContentState { track_id, .. }
            | ReportEvent::Log { track_id, .. } => track_id,
        }
    }
}

impl fmt::Display for ReportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportEvent::Progress {
                track_id,
                progress_ms,
            } => write!(f, "[{}] progress {:.1}ms", track_id, progress_ms),
            ReportEvent::Stuck { track_id } => write!(f, "[{}] stuck", track_id),
            ReportEvent::Unstuck { track_id } => write!(f, "[{}] unstuck", track_id),
            ReportEvent::Finished { track_id } => write!(f, "[{}] finished", track_id),
            ReportEvent::ContentState { track_id, state } => {
                write!(f, "[{}] content state {}", track_id, state)
            }
            ReportEvent::Log { track_id, message } => write!(f, "[{}] {}", track_id, message),
        }
    }
}

/// A report event with the wall-clock time it was observed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: ReportEvent,
}

impl ReportRecord {
    /// Stamp an event with the current time
    pub fn now(event: ReportEvent) -> Self {
        Self {
            at: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_event_serializes_with_type_tag() {
        let event = ReportEvent::Progress {
            track_id: TrackId::new("video-1"),
            progress_ms: 1050.0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["track_id"], "video-1");
        assert_eq!(json["progress_ms"], 1050.0);
    }

    #[test]
    fn test_content_state_serializes_lowercase() {
        let event = ReportEvent::ContentState {
            track_id: "a".into(),
            state: ContentState::Preloading,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"state\":\"preloading\""));
    }

    #[test]
    fn test_record_flattens_event() {
        let record = ReportRecord::now(ReportEvent::Stuck {
            track_id: "audio".into(),
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "stuck");
        assert!(json.get("at").is_some());

        let back: ReportRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.event, record.event);
    }

    #[test]
    fn test_record_is_stamped_with_current_time() {
        let before = Utc::now();
        let record = ReportRecord::now(ReportEvent::Finished {
            track_id: "video".into(),
        });
        assert!(record.at >= before);
        assert!(record.at <= Utc::now());
    }

    #[test]
    fn test_stuck_reason_display() {
        assert_eq!(StuckReason::InsufficientData.to_string(), "insufficient-data");
        assert_eq!(StuckReason::Seeking.to_string(), "seeking");
    }

    #[test]
    fn test_track_id_accessor() {
        let event = ReportEvent::Log {
            track_id: "t".into(),
            message: "hi".to_string(),
        };
        assert_eq!(event.track_id().as_str(), "t");
    }
}
