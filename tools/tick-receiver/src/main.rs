//! Example ring consumer: attaches to one shared-memory tick ring, reads the
//! published session date range, and drains the ring one trading day at a
//! time, reporting per-day delivery statistics.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use jiffy_clock::{ShutdownFlag, JIFFIES_PER_SEC};
use tick_ring::{DateConfig, RingConsumer};

#[derive(Parser, Debug)]
#[command(name = "tick-receiver", about = "Drain a shared-memory tick ring day by day")]
struct Args {
    /// Ring segment name under /dev/shm.
    #[arg(long, default_value = "jiffy_ring_0")]
    ring: String,

    /// Date-config segment name under /dev/shm.
    #[arg(long, default_value = "jiffy_dates")]
    dates: String,
}

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .init();

    let args = Args::parse();

    let shutdown = ShutdownFlag::new();
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, shutdown.as_atomic())
            .with_context(|| format!("failed to register handler for signal {signal}"))?;
    }

    let (start_date, end_date) = DateConfig::read(&args.dates)
        .with_context(|| format!("failed to read date config segment {}", args.dates))?;
    let mut consumer = RingConsumer::open(&args.ring)
        .with_context(|| format!("failed to open ring segment {}", args.ring))?;
    tracing::info!(
        ring = %args.ring,
        capacity = consumer.capacity(),
        start = %start_date,
        end = %end_date,
        "attached to ring"
    );

    if !consumer.wait_until_running(&shutdown) {
        tracing::warn!("interrupted before the producer started");
        return Ok(());
    }

    let mut days_processed = 0u32;
    let mut date = start_date;
    let mut interrupted = false;

    while date <= end_date {
        tracing::info!(%date, "draining trading day");
        let started = Instant::now();

        let mut first_tick = None;
        let mut last_tick = None;
        let summary = consumer.run(&shutdown, |event| {
            first_tick.get_or_insert(event.tick_number);
            last_tick = Some(event.tick_number);
        });
        let elapsed = started.elapsed();

        if shutdown.is_set() {
            interrupted = true;
            break;
        }

        days_processed += 1;
        tracing::info!(
            %date,
            processed = summary.processed,
            generated = summary.total_generated,
            dropped = summary.dropped_count,
            success_rate_pct = summary.success_rate() * 100.0,
            sim_seconds = summary.processed as f64 / JIFFIES_PER_SEC as f64,
            elapsed_secs = elapsed.as_secs_f64(),
            first_tick = first_tick.unwrap_or_default(),
            last_tick = last_tick.unwrap_or_default(),
            "day drained"
        );

        let next = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
        if next <= end_date {
            // The producer re-arms the ring between days; re-entering the
            // drain loop before that would see a stale finished flag.
            if !consumer.wait_for_reset(&shutdown) {
                interrupted = true;
                break;
            }
        }
        date = next;
    }

    if interrupted {
        tracing::warn!(days_processed, "receiver interrupted");
    } else {
        tracing::info!(days_processed, "all session days drained");
    }
    Ok(())
}
