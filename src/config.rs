//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the snow-config.toml file.
//! It holds the upstream addresses, the polling cadence, and the network timeouts.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "snow-config.toml";

/// Allowed report refresh intervals in minutes, with their labels
pub const UPDATE_INTERVAL_OPTIONS: [(u64, &str); 6] = [
    (60, "Every hour"),
    (120, "Every 2 hours"),
    (180, "Every 3 hours"),
    (360, "Every 6 hours"),
    (720, "Every 12 hours"),
    (1440, "Once a day"),
];

/// Report refresh interval used when none (or an unsupported one) is configured
pub const DEFAULT_UPDATE_INTERVAL_MINUTES: u64 = 120;

/// Application configuration loaded from snow-config.toml
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Upstream addresses
    pub source: SourceConfig,
    /// Polling cadence and timeouts
    pub schedule: ScheduleConfig,
}

/// Where the report and the webcam image come from
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Snow report page
    pub report_url: String,
    /// Fixed webcam image address. When unset, the address the report page
    /// publishes is used instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webcam_url: Option<String>,
    /// User-Agent header sent with every request
    pub user_agent: String,
}

/// Polling cadence and network timeouts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    /// Report refresh interval, one of [`UPDATE_INTERVAL_OPTIONS`]
    pub update_interval_minutes: u64,
    /// Webcam freshness window and refresh interval
    pub webcam_refresh_minutes: u64,
    /// Timeout for report and image downloads
    pub fetch_timeout_secs: u64,
    /// Timeout for the connectivity probe
    pub probe_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source: SourceConfig {
                report_url: "https://www.livigno.eu/en/snow-data".to_string(),
                webcam_url: None,
                user_agent: concat!("snow-report/", env!("CARGO_PKG_VERSION")).to_string(),
            },
            schedule: ScheduleConfig {
                update_interval_minutes: DEFAULT_UPDATE_INTERVAL_MINUTES,
                webcam_refresh_minutes: 5,
                fetch_timeout_secs: 30,
                probe_timeout_secs: 10,
            },
        }
    }
}

impl Config {
    /// Load configuration from snow-config.toml
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), report_url = %config.source.report_url, "loaded configuration");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), "invalid config file format, using defaults: {e}");
                    Self::default()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "no config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save current configuration to the given path
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, contents)?;
        info!(path = %path.as_ref().display(), "configuration saved");
        Ok(())
    }

    /// Save current configuration to snow-config.toml
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to_path(CONFIG_FILE)
    }

    /// Report refresh interval.
    ///
    /// Values outside [`UPDATE_INTERVAL_OPTIONS`] fall back to the default.
    pub fn update_interval(&self) -> Duration {
        let minutes = self.schedule.update_interval_minutes;
        let minutes = if UPDATE_INTERVAL_OPTIONS.iter().any(|&(m, _)| m == minutes) {
            minutes
        } else {
            warn!(
                minutes,
                default = DEFAULT_UPDATE_INTERVAL_MINUTES,
                "unsupported update interval, using default"
            );
            DEFAULT_UPDATE_INTERVAL_MINUTES
        };
        Duration::from_secs(minutes * 60)
    }

    /// Webcam freshness window, also used as its refresh interval
    pub fn webcam_refresh(&self) -> Duration {
        Duration::from_secs(self.schedule.webcam_refresh_minutes.max(1) * 60)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.schedule.fetch_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.schedule.probe_timeout_secs)
    }
}

/// Human label for an update interval, e.g. "Every 2 hours"
pub fn interval_label(minutes: u64) -> Option<&'static str> {
    UPDATE_INTERVAL_OPTIONS
        .iter()
        .find(|&&(m, _)| m == minutes)
        .map(|&(_, label)| label)
}
