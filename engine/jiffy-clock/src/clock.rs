//! The jiffy tick loop and day re-basing arithmetic.

use std::hint;
use std::time::{Duration, Instant};

use chrono::NaiveDate;

use crate::config::{ClockConfig, RateMode};
use crate::error::ClockError;
use crate::shutdown::ShutdownFlag;
use crate::{EPOCH_YEAR, JIFFIES_PER_SEC};

/// Produces a strictly increasing jiffy counter over a day's window.
///
/// The counter is absolute: each session day is re-based to the number of
/// jiffies elapsed from 1980-01-01 00:00 to that day's open instant, so the
/// jiffy value doubles as the record timestamp key.
#[derive(Debug, Clone)]
pub struct JiffyClock {
    config: ClockConfig,
}

impl JiffyClock {
    pub fn new(config: ClockConfig) -> Result<Self, ClockError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    /// Jiffy value at `date`'s session open (the day's re-base origin).
    pub fn day_base_jiffy(&self, date: NaiveDate) -> Result<u64, ClockError> {
        let epoch = NaiveDate::from_ymd_opt(EPOCH_YEAR, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or(ClockError::InvalidDate)?;
        let open = date
            .and_hms_opt(0, 0, 0)
            .ok_or(ClockError::InvalidDate)?
            + chrono::Duration::seconds(self.config.open_offset_secs as i64);

        let secs = (open - epoch).num_seconds();
        if secs < 0 {
            return Err(ClockError::DateBeforeEpoch { date });
        }
        Ok(secs as u64 * JIFFIES_PER_SEC)
    }

    /// Jiffy value at `date`'s session close.
    pub fn day_end_jiffy(&self, date: NaiveDate) -> Result<u64, ClockError> {
        Ok(self.day_base_jiffy(date)? + self.config.session_jiffies())
    }

    /// Run the tick loop from `start` (inclusive) to `end` (exclusive),
    /// invoking `on_tick` once per jiffy, pacing according to the configured
    /// rate mode. Exits early when `shutdown` is observed; partial ticks are
    /// not rolled back. Returns the number of ticks produced.
    pub fn run<F>(&self, start: u64, end: u64, shutdown: &ShutdownFlag, mut on_tick: F) -> u64
    where
        F: FnMut(u64),
    {
        tracing::debug!(start, end, mode = ?self.config.rate_mode, "tick loop starting");
        let mut jiffy = start;

        match self.config.rate_mode {
            RateMode::Unthrottled => {
                while jiffy < end && !shutdown.is_set() {
                    on_tick(jiffy);
                    jiffy += 1;
                }
            }
            RateMode::Throttled { spin_iterations } => {
                while jiffy < end && !shutdown.is_set() {
                    on_tick(jiffy);
                    jiffy += 1;
                    spin_delay(spin_iterations);
                }
            }
            RateMode::WallPaced { speedup } => {
                let jiffy_ns = 1e9 / JIFFIES_PER_SEC as f64 / speedup;
                if jiffy_ns < 1.0 {
                    // Sub-nanosecond deadlines degenerate to free running.
                    return self
                        .with_rate(RateMode::Unthrottled)
                        .run(start, end, shutdown, on_tick);
                }
                let origin = Instant::now();
                while jiffy < end {
                    let target =
                        origin + Duration::from_nanos(((jiffy - start) as f64 * jiffy_ns) as u64);
                    // The deadline spin still re-checks the flag every poll.
                    let mut interrupted = false;
                    while Instant::now() < target {
                        if shutdown.is_set() {
                            interrupted = true;
                            break;
                        }
                        hint::spin_loop();
                    }
                    if interrupted || shutdown.is_set() {
                        break;
                    }
                    on_tick(jiffy);
                    jiffy += 1;
                }
            }
        }

        jiffy - start
    }

    fn with_rate(&self, rate_mode: RateMode) -> JiffyClock {
        JiffyClock { config: ClockConfig { rate_mode, ..self.config } }
    }

    /// Human-readable HH:MM:SS.jjjjj label for a jiffy offset into the day.
    pub fn wall_label(&self, jiffy_offset: u64) -> String {
        let total_secs = jiffy_offset / JIFFIES_PER_SEC + self.config.open_offset_secs;
        let jiff_in_sec = jiffy_offset % JIFFIES_PER_SEC;
        format!(
            "{:02}:{:02}:{:02}.{:05}",
            total_secs / 3600,
            (total_secs % 3600) / 60,
            total_secs % 60,
            jiff_in_sec
        )
    }
}

/// Bounded busy loop. `black_box` keeps the counter live so the spin is not
/// optimized away.
#[inline]
fn spin_delay(iterations: u64) {
    let mut i = 0u64;
    while hint::black_box(i) < iterations {
        i += 1;
    }
}
