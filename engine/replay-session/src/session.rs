//! The day-by-day session state machine.

use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::NaiveDate;

use datagram_feed::DatagramFeed;
use jiffy_clock::{JiffyClock, ShutdownFlag};
use record_index::JiffyIndex;
use tick_ring::{RingProducer, TickEvent};

use crate::config::SessionConfig;
use crate::stats::{DayStats, SessionStats};
use crate::SessionError;

/// Granularity at which interruptible waits re-check the shutdown flag.
const PAUSE_SLICE: Duration = Duration::from_millis(100);

/// Drives the replay across the configured date range, one trading day at a
/// time: re-base the jiffy origin, run the clock over the day's window,
/// dispatch ticks to every ring (lockstep) and record batches to the feed,
/// then drain, report, reset, and move to the next day.
pub struct SessionController {
    clock: JiffyClock,
    index: JiffyIndex,
    rings: Vec<RingProducer>,
    feed: Option<DatagramFeed>,
    config: SessionConfig,
    shutdown: ShutdownFlag,
}

impl SessionController {
    pub fn new(
        clock: JiffyClock,
        index: JiffyIndex,
        rings: Vec<RingProducer>,
        feed: Option<DatagramFeed>,
        config: SessionConfig,
        shutdown: ShutdownFlag,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self { clock, index, rings, feed, config, shutdown })
    }

    /// Run the whole session. Consumes the controller; ring segments are
    /// torn down when the producers drop at return.
    pub fn run(mut self) -> Result<SessionStats, SessionError> {
        tracing::info!(
            start = %self.config.start_date,
            end = %self.config.end_date,
            records = self.index.len(),
            rings = self.rings.len(),
            feed = self.feed.is_some(),
            "session starting"
        );

        let mut stats = SessionStats::default();
        let mut date = self.config.start_date;

        while date <= self.config.end_date {
            if self.shutdown.is_set() {
                stats.interrupted = true;
                break;
            }
            // The date active from here on; reported even if the day is cut
            // short and therefore not counted.
            stats.last_processed_date = Some(date);

            let day = self.run_day(date)?;
            day.report();

            for ring in &self.rings {
                ring.finish();
            }
            let drained = self.rings.iter().all(|ring| ring.wait_drained(&self.shutdown));
            if self.shutdown.is_set() || !drained {
                stats.interrupted = true;
                break;
            }
            stats.days_processed += 1;

            let next = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
            if next <= self.config.end_date {
                for ring in self.rings.iter_mut() {
                    ring.reset();
                }
                if let Some(feed) = self.feed.as_mut() {
                    feed.reset_counters();
                }
                tracing::info!(pause_secs = self.config.inter_day_pause_secs, "waiting for next market day");
                if !self.sleep_interruptible(self.config.inter_day_pause()) {
                    stats.interrupted = true;
                    break;
                }
            }
            date = next;
        }

        stats.report();
        Ok(stats)
    }

    /// One `DayActive` phase: clock from the day's base jiffy to its end,
    /// dispatching per jiffy. Returns the day's counters; stops early (without
    /// rolling back partial ticks) when shutdown is observed.
    fn run_day(&mut self, date: NaiveDate) -> Result<DayStats, SessionError> {
        let base_jiffy = self.clock.day_base_jiffy(date)?;
        let end_jiffy = base_jiffy + self.clock.config().session_jiffies();
        tracing::info!(%date, base_jiffy, end_jiffy, "starting tick generation");

        for ring in &self.rings {
            ring.mark_running();
        }

        let mut found = 0u64;
        let mut batches_sent = 0u64;
        let mut send_failures = 0u64;

        let started = Instant::now();
        let Self { clock, index, rings, feed, shutdown, .. } = self;
        let ticks = clock.run(base_jiffy, end_jiffy, shutdown, |jiffy| {
            let event = TickEvent { tick_number: jiffy, timestamp_ns: unix_nanos() };
            for ring in rings.iter_mut() {
                ring.try_push(event);
            }
            if let Some(bucket) = index.get(jiffy) {
                found += bucket.len() as u64;
                if let Some(feed) = feed.as_mut() {
                    if feed.send_batch(bucket) {
                        batches_sent += 1;
                    } else {
                        send_failures += 1;
                    }
                }
            }
        });
        let elapsed = started.elapsed();

        Ok(DayStats {
            date,
            ticks,
            found,
            batches_sent,
            send_failures,
            ring_accepted: self.rings.iter().map(RingProducer::accepted).sum(),
            ring_dropped: self.rings.iter().map(RingProducer::dropped_count).sum(),
            elapsed,
        })
    }

    /// Sleep in small slices, re-checking the shutdown flag. Returns `false`
    /// if interrupted.
    fn sleep_interruptible(&self, total: Duration) -> bool {
        let deadline = Instant::now() + total;
        loop {
            if self.shutdown.is_set() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(PAUSE_SLICE.min(deadline - now));
        }
    }
}

fn unix_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiffy_clock::{ClockConfig, RateMode, JIFFIES_PER_SEC};
    use record_index::{Record, RECORD_SIZE};
    use std::io::Write;
    use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
    use tempfile::TempDir;
    use tick_ring::RingConsumer;

    const OPEN: u64 = 9 * 3600;

    fn one_second_session_clock() -> JiffyClock {
        // A one-second day keeps unthrottled test runs at 65,536 ticks.
        JiffyClock::new(ClockConfig {
            rate_mode: RateMode::Unthrottled,
            open_offset_secs: OPEN,
            close_offset_secs: OPEN + 1,
        })
        .unwrap()
    }

    fn record_with(jiffy: u64) -> Record {
        let mut bytes = [b'.'; RECORD_SIZE];
        let key = format!("{jiffy:014}");
        bytes[22..36].copy_from_slice(key.as_bytes());
        Record::new(bytes)
    }

    fn index_with(dir: &TempDir, jiffies: &[u64]) -> JiffyIndex {
        let path = dir.path().join("records.DAT");
        let mut file = std::fs::File::create(&path).unwrap();
        for &jiffy in jiffies {
            file.write_all(record_with(jiffy).as_bytes()).unwrap();
        }
        file.flush().unwrap();
        JiffyIndex::build(&path).unwrap()
    }

    fn local_receiver() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    fn single_day(date: NaiveDate) -> SessionConfig {
        SessionConfig { start_date: date, end_date: date, inter_day_pause_secs: 0 }
    }

    #[test]
    fn datagrams_carry_whole_batches_in_jiffy_order() {
        let dir = TempDir::new().unwrap();
        let clock = one_second_session_clock();
        let date = NaiveDate::from_ymd_opt(2024, 9, 2).unwrap();
        let base = clock.day_base_jiffy(date).unwrap();

        // 3 records at the day's first jiffy, 2 at the second.
        let index = index_with(&dir, &[base, base, base, base + 1, base + 1]);
        let (receiver, addr) = local_receiver();
        let feed = DatagramFeed::connect(datagram_feed::FeedConfig { dest: addr }).unwrap();

        let controller = SessionController::new(
            clock,
            index,
            Vec::new(),
            Some(feed),
            single_day(date),
            ShutdownFlag::new(),
        )
        .unwrap();
        let stats = controller.run().unwrap();

        assert!(!stats.interrupted);
        assert_eq!(stats.days_processed, 1);
        assert_eq!(stats.last_processed_date, Some(date));

        let mut buf = [0u8; 1024];
        let first = receiver.recv(&mut buf).unwrap();
        assert_eq!(first, 3 * RECORD_SIZE);
        let second = receiver.recv(&mut buf).unwrap();
        assert_eq!(second, 2 * RECORD_SIZE);
    }

    #[test]
    fn rings_receive_the_full_day_in_lockstep() {
        let dir = TempDir::new().unwrap();
        let clock = one_second_session_clock();
        let date = NaiveDate::from_ymd_opt(2024, 9, 2).unwrap();
        let base = clock.day_base_jiffy(date).unwrap();

        let ring_paths =
            [dir.path().join("ring_a"), dir.path().join("ring_b")];
        let rings = ring_paths
            .iter()
            .map(|p| RingProducer::create_at(p, 2 * JIFFIES_PER_SEC).unwrap())
            .collect::<Vec<_>>();
        let consumers = ring_paths
            .iter()
            .map(|p| RingConsumer::open_at(p).unwrap())
            .collect::<Vec<_>>();

        let handles: Vec<_> = consumers
            .into_iter()
            .map(|mut consumer| {
                thread::spawn(move || {
                    let mut first = None;
                    let mut last = None;
                    let summary = consumer.run(&ShutdownFlag::new(), |e| {
                        first.get_or_insert(e.tick_number);
                        last = Some(e.tick_number);
                    });
                    (summary.processed, first, last)
                })
            })
            .collect();

        let controller = SessionController::new(
            clock,
            JiffyIndex::default(),
            rings,
            None,
            single_day(date),
            ShutdownFlag::new(),
        )
        .unwrap();
        let stats = controller.run().unwrap();
        assert!(!stats.interrupted);

        for handle in handles {
            let (processed, first, last) = handle.join().unwrap();
            // Buffers are larger than the day, so nothing is dropped.
            assert_eq!(processed, JIFFIES_PER_SEC);
            assert_eq!(first, Some(base));
            assert_eq!(last, Some(base + JIFFIES_PER_SEC - 1));
        }
    }

    #[test]
    fn shutdown_mid_day_reports_the_active_date_without_counting_it() {
        let clock = JiffyClock::new(ClockConfig {
            // Real-time pacing makes the one-second day long enough to
            // interrupt reliably.
            rate_mode: RateMode::WallPaced { speedup: 1.0 },
            open_offset_secs: OPEN,
            close_offset_secs: OPEN + 1,
        })
        .unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 9, 2).unwrap();
        let shutdown = ShutdownFlag::new();

        let interrupter = shutdown.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            interrupter.request();
        });

        let controller = SessionController::new(
            clock,
            JiffyIndex::default(),
            Vec::new(),
            None,
            single_day(date),
            shutdown,
        )
        .unwrap();
        let stats = controller.run().unwrap();
        handle.join().unwrap();

        assert!(stats.interrupted);
        assert_eq!(stats.days_processed, 0, "an interrupted day must not be counted");
        assert_eq!(stats.last_processed_date, Some(date));
    }

    #[test]
    fn shutdown_before_start_processes_nothing() {
        let date = NaiveDate::from_ymd_opt(2024, 9, 2).unwrap();
        let shutdown = ShutdownFlag::new();
        shutdown.request();

        let controller = SessionController::new(
            one_second_session_clock(),
            JiffyIndex::default(),
            Vec::new(),
            None,
            single_day(date),
            shutdown,
        )
        .unwrap();
        let stats = controller.run().unwrap();

        assert!(stats.interrupted);
        assert_eq!(stats.days_processed, 0);
        assert_eq!(stats.last_processed_date, None);
    }

    #[test]
    fn reversed_date_range_is_fatal_at_construction() {
        let start = NaiveDate::from_ymd_opt(2024, 9, 3).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 9, 2).unwrap();
        let res = SessionController::new(
            one_second_session_clock(),
            JiffyIndex::default(),
            Vec::new(),
            None,
            SessionConfig::new(start, end),
            ShutdownFlag::new(),
        );
        assert!(matches!(res, Err(SessionError::InvalidDateRange { .. })));
    }
}
