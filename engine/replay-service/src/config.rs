//! Service configuration: TOML file plus command-line overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use datagram_feed::FeedConfig;
use jiffy_clock::{ClockConfig, JIFFIES_PER_SEC};
use replay_session::DEFAULT_INTER_DAY_PAUSE_SECS;

/// Top-level configuration for the replay producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Record file to index and replay.
    pub data_file: PathBuf,

    /// Virtual clock settings (rate mode, session window).
    pub clock: ClockConfig,

    /// Shared-memory ring settings.
    pub rings: RingSettings,

    /// Datagram feed settings.
    pub feed: FeedSettings,

    /// Pause between session days, in seconds.
    pub inter_day_pause_secs: u64,
}

/// Shared-memory ring fan-out: one independent SPSC ring per name, all fed
/// the same tick stream in lockstep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RingSettings {
    /// Well-known segment names under `/dev/shm`. Empty disables the rings.
    pub names: Vec<String>,

    /// Slots per ring; must be a power of two.
    pub capacity: u64,

    /// Segment name for the published session date range.
    pub date_segment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// Whether record batches are sent at all.
    pub enabled: bool,

    /// Destination host/port for every batch.
    pub dest: std::net::SocketAddr,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("Data/sorted_filtered_data.DAT"),
            clock: ClockConfig::default(),
            rings: RingSettings::default(),
            feed: FeedSettings::default(),
            inter_day_pause_secs: DEFAULT_INTER_DAY_PAUSE_SECS,
        }
    }
}

impl Default for RingSettings {
    fn default() -> Self {
        Self {
            names: vec!["jiffy_ring_0".to_string()],
            capacity: 2 * JIFFIES_PER_SEC,
            date_segment: "jiffy_dates".to_string(),
        }
    }
}

impl Default for FeedSettings {
    fn default() -> Self {
        let feed = FeedConfig::default();
        Self { enabled: true, dest: feed.dest }
    }
}

impl ReplayConfig {
    /// Load from a TOML file; missing sections fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: ReplayConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiffy_clock::RateMode;
    use std::io::Write;

    #[test]
    fn defaults_are_usable() {
        let config = ReplayConfig::default();
        config.clock.validate().unwrap();
        assert!(config.rings.capacity.is_power_of_two());
        assert!(config.feed.enabled);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
data_file = "custom.DAT"

[clock]
rate_mode = {{ WallPaced = {{ speedup = 1000.0 }} }}
open_offset_secs = 32400
close_offset_secs = 55800

[rings]
names = ["ring_a", "ring_b"]
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = ReplayConfig::from_file(file.path()).unwrap();
        assert_eq!(config.data_file, PathBuf::from("custom.DAT"));
        assert!(matches!(config.clock.rate_mode, RateMode::WallPaced { speedup } if speedup == 1000.0));
        assert_eq!(config.rings.names, ["ring_a", "ring_b"]);
        // Unspecified fields keep their defaults.
        assert_eq!(config.rings.capacity, 2 * JIFFIES_PER_SEC);
        assert!(config.feed.enabled);
    }
}
