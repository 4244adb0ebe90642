//! # jiffy-clock
//!
//! The virtual market-session clock. A jiffy is 1/65536 of a second; this
//! crate turns a calendar day into a jiffy window (open to close) and drives
//! a strictly increasing jiffy counter across that window at a configurable
//! rate: as fast as the host allows, throttled by a bounded spin, or paced
//! against the wall clock for a deterministic speedup.

pub mod clock;
pub mod config;
pub mod error;
pub mod shutdown;

pub use clock::JiffyClock;
pub use config::{ClockConfig, RateMode};
pub use error::ClockError;
pub use shutdown::ShutdownFlag;

/// Jiffies per second. Fixed by the record format, never configurable.
pub const JIFFIES_PER_SEC: u64 = 1 << 16;

/// Epoch for jiffy arithmetic: 1980-01-01 00:00:00.
pub const EPOCH_YEAR: i32 = 1980;

/// Default session open, seconds after midnight (09:00:00).
pub const DEFAULT_OPEN_OFFSET_SECS: u64 = 9 * 3600;

/// Default session close, seconds after midnight (15:30:00).
pub const DEFAULT_CLOSE_OFFSET_SECS: u64 = 15 * 3600 + 30 * 60;
