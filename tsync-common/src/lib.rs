//! # tsync Common Library
//!
//! Shared code for the track synchronization engine:
//! - Clock model arithmetic and injectable clock sources
//! - Reporting event types (what a track tells the scheduler)
//! - Tunables and configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod timing;

pub use error::{Error, Result};
pub use events::{ContentState, ReportEvent, ReportRecord, TrackId};
pub use timing::{Clock, ClockSample, ManualClock, MonotonicClock};
