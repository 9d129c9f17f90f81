//! Configuration management
//!
//! TOML-backed configuration with per-field defaults and environment variable
//! overrides. Only the knobs this layer consults are configured here: the
//! cancel-request retention timeout, the global 1-minute-aggregation switch,
//! and the UTC offset of the requester's wall clock.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Query-layer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Minutes a cancel-failed marker is retained before opportunistic
    /// eviction makes it eligible for removal
    #[serde(default = "default_cancel_timeout_minutes")]
    pub cancel_request_timeout_minutes: u64,

    /// Whether 1-minute aggregation views are enabled globally
    #[serde(default = "default_true")]
    pub one_minute_aggregation: bool,

    /// UTC offset of the requester's local wall clock, e.g. "+05:30" or "-02:00"
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

fn default_cancel_timeout_minutes() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_utc_offset() -> String {
    "+00:00".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cancel_request_timeout_minutes: default_cancel_timeout_minutes(),
            one_minute_aggregation: default_true(),
            utc_offset: default_utc_offset(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("failed to read {}: {}", path, e)))?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Configuration(format!("failed to parse {}: {}", path, e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file_with_env(path: &str) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from defaults plus environment overrides
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply `NETQUERY_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(minutes) = std::env::var("NETQUERY_CANCEL_TIMEOUT_MINUTES") {
            if let Ok(minutes) = minutes.parse() {
                self.cancel_request_timeout_minutes = minutes;
            }
        }
        if let Ok(enabled) = std::env::var("NETQUERY_ONE_MINUTE_AGGREGATION") {
            if let Ok(enabled) = enabled.parse() {
                self.one_minute_aggregation = enabled;
            }
        }
        if let Ok(offset) = std::env::var("NETQUERY_UTC_OFFSET") {
            self.utc_offset = offset;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.cancel_request_timeout_minutes == 0 {
            return Err(Error::Configuration(
                "cancel_request_timeout_minutes must be greater than zero".to_string(),
            ));
        }
        self.utc_offset_minutes()?;
        Ok(())
    }

    /// Cancel-failed marker retention as a [`Duration`]
    pub fn cancel_timeout(&self) -> Duration {
        Duration::from_secs(self.cancel_request_timeout_minutes * 60)
    }

    /// Parse the configured UTC offset into signed minutes.
    ///
    /// Accepts `[+|-]HH:MM`; a missing sign means east of UTC.
    pub fn utc_offset_minutes(&self) -> Result<i32> {
        parse_utc_offset(&self.utc_offset)
    }
}

fn parse_utc_offset(offset: &str) -> Result<i32> {
    let bad = || Error::Configuration(format!("invalid utc_offset: {:?}", offset));
    let trimmed = offset.trim();
    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'+') => (1, &trimmed[1..]),
        Some(b'-') => (-1, &trimmed[1..]),
        Some(_) => (1, trimmed),
        None => return Err(bad()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(bad)?;
    let hours: i32 = hours.parse().map_err(|_| bad())?;
    let minutes: i32 = minutes.parse().map_err(|_| bad())?;
    if !(0..=14).contains(&hours) || !(0..=59).contains(&minutes) {
        return Err(bad());
    }
    Ok(sign * (hours * 60 + minutes))
}
