//! Signal handling: SIGINT/SIGTERM latch the shared shutdown flag.

use anyhow::{Context, Result};
use signal_hook::consts::{SIGINT, SIGTERM};

use jiffy_clock::ShutdownFlag;

/// Register the operator-cancel signals against the session's shutdown
/// flag. Hot loops poll the flag; nothing is killed asynchronously.
pub fn register_shutdown_signals(shutdown: &ShutdownFlag) -> Result<()> {
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, shutdown.as_atomic())
            .with_context(|| format!("failed to register handler for signal {signal}"))?;
    }
    Ok(())
}
