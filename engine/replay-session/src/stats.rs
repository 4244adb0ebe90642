//! Per-day and cumulative session statistics.

use std::time::Duration;

use chrono::NaiveDate;

use jiffy_clock::JIFFIES_PER_SEC;

/// Counters for one session day, reported at the day boundary.
#[derive(Debug, Clone)]
pub struct DayStats {
    pub date: NaiveDate,
    /// Jiffies produced this day (may stop short of the window on shutdown).
    pub ticks: u64,
    /// Records matched by index lookups.
    pub found: u64,
    /// Datagrams delivered to the socket.
    pub batches_sent: u64,
    /// Datagram sends that failed (counted, never retried).
    pub send_failures: u64,
    /// Events accepted across all rings.
    pub ring_accepted: u64,
    /// Events dropped across all rings (buffer full).
    pub ring_dropped: u64,
    /// Wall-clock time spent in the day's tick loop.
    pub elapsed: Duration,
}

impl DayStats {
    /// Seconds of virtual session time covered by the ticks produced.
    pub fn sim_seconds(&self) -> f64 {
        self.ticks as f64 / JIFFIES_PER_SEC as f64
    }

    /// Ticks per wall-clock second.
    pub fn tick_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.ticks as f64 / secs
        } else {
            0.0
        }
    }

    /// Virtual-to-wall speedup observed.
    pub fn speedup(&self) -> f64 {
        self.tick_rate() / JIFFIES_PER_SEC as f64
    }

    pub fn report(&self) {
        tracing::info!(
            date = %self.date,
            ticks = self.ticks,
            elapsed_secs = self.elapsed.as_secs_f64(),
            sim_seconds = self.sim_seconds(),
            tick_rate = self.tick_rate(),
            speedup = self.speedup(),
            found = self.found,
            batches_sent = self.batches_sent,
            send_failures = self.send_failures,
            ring_accepted = self.ring_accepted,
            ring_dropped = self.ring_dropped,
            "tick simulation ended"
        );
    }
}

/// Cumulative outcome of a session run.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Days fully drained. Excludes a day in progress when shutdown arrived.
    pub days_processed: u32,
    /// The date active when the run stopped, whether or not it completed.
    pub last_processed_date: Option<NaiveDate>,
    /// Whether the run ended on the shutdown signal rather than the end date.
    pub interrupted: bool,
}

impl SessionStats {
    pub fn report(&self) {
        let last = self
            .last_processed_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "none".to_string());
        if self.interrupted {
            tracing::warn!(
                days_processed = self.days_processed,
                last_processed_date = %last,
                "simulation interrupted"
            );
        } else {
            tracing::info!(
                days_processed = self.days_processed,
                last_processed_date = %last,
                "simulation complete"
            );
        }
    }
}
