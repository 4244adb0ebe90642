//! # replay-session
//!
//! The session controller: selects the current trading day, re-bases the
//! jiffy origin, drives the clock across the day's window, dispatches each
//! jiffy's tick event to the shared-memory rings and its record batch to the
//! datagram feed, and reports per-day and cumulative statistics. Handles
//! asynchronous shutdown as a first-class terminal path distinct from
//! completion.

mod config;
mod session;
mod stats;

pub use config::{SessionConfig, DEFAULT_INTER_DAY_PAUSE_SECS};
pub use session::SessionController;
pub use stats::{DayStats, SessionStats};

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error(transparent)]
    Clock(#[from] jiffy_clock::ClockError),
}
