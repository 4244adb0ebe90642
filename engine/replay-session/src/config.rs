//! Session-level configuration.

use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::SessionError;

/// Default pause between session days, standing in for "wait for the next
/// market open".
pub const DEFAULT_INTER_DAY_PAUSE_SECS: u64 = 10;

/// Configuration for one replay session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// First trading day, inclusive.
    pub start_date: NaiveDate,

    /// Last trading day, inclusive.
    pub end_date: NaiveDate,

    /// Pause between days, in seconds.
    pub inter_day_pause_secs: u64,
}

impl SessionConfig {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self { start_date, end_date, inter_day_pause_secs: DEFAULT_INTER_DAY_PAUSE_SECS }
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.start_date > self.end_date {
            return Err(SessionError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        Ok(())
    }

    pub fn inter_day_pause(&self) -> Duration {
        Duration::from_secs(self.inter_day_pause_secs)
    }
}
