//! Error types for the jiffy clock.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur while configuring or running the clock.
#[derive(Error, Debug)]
pub enum ClockError {
    #[error("session close offset {close_offset_secs}s is not after open offset {open_offset_secs}s")]
    EmptySessionWindow { open_offset_secs: u64, close_offset_secs: u64 },

    #[error("wall-paced speedup must be a positive finite number, got {speedup}")]
    InvalidSpeedup { speedup: f64 },

    #[error("date {date} is before the jiffy epoch (1980-01-01)")]
    DateBeforeEpoch { date: NaiveDate },

    #[error("invalid calendar date")]
    InvalidDate,
}
