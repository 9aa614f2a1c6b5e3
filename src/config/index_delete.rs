//! Index expiry configuration.
//!
//! Controls how old graph index rows must be before the reaper removes them
//! together with their RRD files, and when the weekly run fires.
//!
//! # Example
//!
//! ```toml
//! [index_delete]
//! enabled = true
//! retention_secs = 604800
//!
//! [index_delete.schedule]
//! weekday = "sat"
//! hour = 2
//! minute = 0
//! ```

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Index expiry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexDeleteConfig {
    /// Whether the scheduled worker runs at all.
    /// Default: true
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Rows whose `ts` is older than `now - retention_secs` are expired.
    /// Default: 604800 (one week)
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// If true, log what would be deleted without deleting rows or files.
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,

    /// Run once immediately when the worker starts, before waiting for the
    /// first scheduled tick.
    /// Default: false
    #[serde(default)]
    pub run_on_start: bool,

    /// When the weekly run fires.
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl Default for IndexDeleteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_secs: default_retention_secs(),
            dry_run: false,
            run_on_start: false,
            schedule: ScheduleConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_retention_secs() -> u64 {
    7 * 24 * 3600
}

/// Weekly schedule, evaluated in UTC.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    /// Day of the week ("mon", "tuesday", "Sat", ...).
    /// Default: "sat"
    #[serde(default = "default_weekday")]
    pub weekday: String,

    /// Hour of the day, 0-23.
    /// Default: 2
    #[serde(default = "default_hour")]
    pub hour: u32,

    /// Minute of the hour, 0-59.
    /// Default: 0
    #[serde(default)]
    pub minute: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            weekday: default_weekday(),
            hour: default_hour(),
            minute: 0,
        }
    }
}

fn default_weekday() -> String {
    "sat".to_string()
}

fn default_hour() -> u32 {
    2
}

/// Longest accepted retention window: 100 years.
pub const MAX_RETENTION_SECS: u64 = 100 * 365 * 86_400;

impl IndexDeleteConfig {
    /// Retention window as a chrono duration, saturating at
    /// [`chrono::TimeDelta::MAX`] for values chrono cannot represent.
    pub fn retention(&self) -> chrono::Duration {
        i64::try_from(self.retention_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention_secs == 0 {
            return Err(ConfigError::Validation(
                "index_delete.retention_secs must be greater than 0".into(),
            ));
        }
        if self.retention_secs > MAX_RETENTION_SECS {
            return Err(ConfigError::Validation(format!(
                "index_delete.retention_secs must be at most {MAX_RETENTION_SECS}, got {}",
                self.retention_secs
            )));
        }
        self.schedule.validate()
    }
}

impl ScheduleConfig {
    /// Parsed day of the week.
    pub fn weekday(&self) -> Result<Weekday, ConfigError> {
        self.weekday.trim().parse::<Weekday>().map_err(|_| {
            ConfigError::Validation(format!(
                "index_delete.schedule.weekday: unknown day '{}'",
                self.weekday
            ))
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weekday()?;
        if self.hour > 23 {
            return Err(ConfigError::Validation(format!(
                "index_delete.schedule.hour must be 0-23, got {}",
                self.hour
            )));
        }
        if self.minute > 59 {
            return Err(ConfigError::Validation(format!(
                "index_delete.schedule.minute must be 0-59, got {}",
                self.minute
            )));
        }
        Ok(())
    }
}
