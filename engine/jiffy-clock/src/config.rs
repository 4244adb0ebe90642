//! Configuration for the jiffy clock.

use serde::{Deserialize, Serialize};

use crate::error::ClockError;
use crate::{DEFAULT_CLOSE_OFFSET_SECS, DEFAULT_OPEN_OFFSET_SECS, JIFFIES_PER_SEC};

/// How the clock paces successive jiffies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RateMode {
    /// Increment as fast as the host can execute. Used to measure the
    /// minimum achievable tick rate.
    Unthrottled,
    /// Spin a bounded busy loop after each increment. Approximates a slower
    /// rate without relying on coarse OS sleep granularity.
    Throttled { spin_iterations: u64 },
    /// Busy-wait each tick until its wall-clock deadline
    /// `origin + n * (1e9 / 65536 / speedup)` ns. Deterministic
    /// virtual-to-wall speedup at the cost of a full core.
    WallPaced { speedup: f64 },
}

impl Default for RateMode {
    fn default() -> Self {
        RateMode::Unthrottled
    }
}

/// Configuration for [`crate::JiffyClock`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Pacing mode for the tick loop.
    pub rate_mode: RateMode,

    /// Session open, seconds after midnight (default 09:00:00).
    pub open_offset_secs: u64,

    /// Session close, seconds after midnight (default 15:30:00).
    pub close_offset_secs: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            rate_mode: RateMode::default(),
            open_offset_secs: DEFAULT_OPEN_OFFSET_SECS,
            close_offset_secs: DEFAULT_CLOSE_OFFSET_SECS,
        }
    }
}

impl ClockConfig {
    pub fn validate(&self) -> Result<(), ClockError> {
        if self.close_offset_secs <= self.open_offset_secs {
            return Err(ClockError::EmptySessionWindow {
                open_offset_secs: self.open_offset_secs,
                close_offset_secs: self.close_offset_secs,
            });
        }
        if let RateMode::WallPaced { speedup } = self.rate_mode {
            if !(speedup.is_finite() && speedup > 0.0) {
                return Err(ClockError::InvalidSpeedup { speedup });
            }
        }
        Ok(())
    }

    /// Length of one session day in seconds.
    pub fn session_seconds(&self) -> u64 {
        self.close_offset_secs - self.open_offset_secs
    }

    /// Length of one session day in jiffies.
    pub fn session_jiffies(&self) -> u64 {
        self.session_seconds() * JIFFIES_PER_SEC
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_session_window() {
        let cfg = ClockConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.session_seconds(), 6 * 3600 + 30 * 60);
        assert_eq!(cfg.session_jiffies(), (6 * 3600 + 30 * 60) * JIFFIES_PER_SEC);
    }

    #[test]
    fn rejects_empty_window() {
        let cfg = ClockConfig { open_offset_secs: 3600, close_offset_secs: 3600, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(ClockError::EmptySessionWindow { .. })));
    }

    #[test]
    fn rejects_bad_speedup() {
        for speedup in [0.0, -4.0, f64::NAN, f64::INFINITY] {
            let cfg = ClockConfig { rate_mode: RateMode::WallPaced { speedup }, ..Default::default() };
            assert!(cfg.validate().is_err(), "speedup {speedup} should be rejected");
        }
    }
}
