//! Replay producer: indexes the record file, creates the shared-memory
//! rings, publishes the session date range, and drives the virtual clock
//! across the configured trading days.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;

use datagram_feed::{DatagramFeed, FeedConfig};
use jiffy_clock::{JiffyClock, RateMode, ShutdownFlag};
use record_index::JiffyIndex;
use replay_service::{initialize_logging, register_shutdown_signals, ReplayConfig};
use replay_session::{SessionConfig, SessionController};
use tick_ring::{DateConfig, RingProducer};

#[derive(Parser, Debug)]
#[command(name = "replay-service", about = "Replay timestamped records over a virtual session clock")]
struct Args {
    /// First trading day, inclusive (YYYY-MM-DD).
    start_date: NaiveDate,

    /// Last trading day, inclusive (YYYY-MM-DD).
    end_date: NaiveDate,

    /// Optional TOML config file; CLI flags override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Record file to index and replay.
    #[arg(long)]
    data: Option<PathBuf>,

    /// Pace ticks against wall time at this virtual-to-wall speedup.
    #[arg(long, conflicts_with_all = ["spin", "unthrottled"])]
    speedup: Option<f64>,

    /// Busy-loop iterations between ticks.
    #[arg(long, conflicts_with = "unthrottled")]
    spin: Option<u64>,

    /// Tick as fast as the host allows.
    #[arg(long)]
    unthrottled: bool,

    /// Skip the datagram feed entirely.
    #[arg(long)]
    no_feed: bool,

    /// Datagram destination (host:port).
    #[arg(long)]
    dest: Option<SocketAddr>,

    /// Ring segment name; repeat for fan-out. Overrides the config list.
    #[arg(long = "ring")]
    rings: Vec<String>,

    /// Slots per ring; must be a power of two.
    #[arg(long)]
    ring_capacity: Option<u64>,

    /// Pause between session days, in seconds.
    #[arg(long)]
    pause: Option<u64>,
}

impl Args {
    fn into_config(self) -> Result<(ReplayConfig, NaiveDate, NaiveDate)> {
        let mut config = match &self.config {
            Some(path) => ReplayConfig::from_file(path)?,
            None => ReplayConfig::default(),
        };

        if let Some(data) = self.data {
            config.data_file = data;
        }
        if self.unthrottled {
            config.clock.rate_mode = RateMode::Unthrottled;
        } else if let Some(spin_iterations) = self.spin {
            config.clock.rate_mode = RateMode::Throttled { spin_iterations };
        } else if let Some(speedup) = self.speedup {
            config.clock.rate_mode = RateMode::WallPaced { speedup };
        }
        if self.no_feed {
            config.feed.enabled = false;
        }
        if let Some(dest) = self.dest {
            config.feed.dest = dest;
        }
        if !self.rings.is_empty() {
            config.rings.names = self.rings;
        }
        if let Some(capacity) = self.ring_capacity {
            config.rings.capacity = capacity;
        }
        if let Some(pause) = self.pause {
            config.inter_day_pause_secs = pause;
        }

        Ok((config, self.start_date, self.end_date))
    }
}

fn main() -> Result<()> {
    initialize_logging()?;

    let (config, start_date, end_date) = Args::parse().into_config()?;

    let clock = JiffyClock::new(config.clock).context("invalid clock configuration")?;

    tracing::info!(data_file = %config.data_file.display(), "indexing record file");
    let index = JiffyIndex::build(&config.data_file)
        .with_context(|| format!("failed to index {}", config.data_file.display()))?;
    tracing::info!(
        records = index.len(),
        buckets = index.bucket_count(),
        "record index built"
    );

    let mut rings = Vec::with_capacity(config.rings.names.len());
    for name in &config.rings.names {
        let ring = RingProducer::create(name, config.rings.capacity)
            .with_context(|| format!("failed to create ring segment {name}"))?;
        rings.push(ring);
    }
    DateConfig::publish(&config.rings.date_segment, start_date, end_date)
        .context("failed to publish session date range")?;

    let feed = if config.feed.enabled {
        let feed = DatagramFeed::connect(FeedConfig { dest: config.feed.dest })
            .with_context(|| format!("failed to open datagram feed to {}", config.feed.dest))?;
        Some(feed)
    } else {
        tracing::info!("datagram feed disabled");
        None
    };

    let shutdown = ShutdownFlag::new();
    register_shutdown_signals(&shutdown)?;

    let session = SessionConfig {
        start_date,
        end_date,
        inter_day_pause_secs: config.inter_day_pause_secs,
    };
    let controller = SessionController::new(clock, index, rings, feed, session, shutdown)?;
    let stats = controller.run()?;

    if stats.interrupted {
        std::process::exit(130);
    }
    Ok(())
}
