//! TOML-based application configuration.
//!
//! Stores the alarm durations:
//! - sleep duration (deadline offset from session start)
//! - grace window (how long an interruption may last)
//! - test-mode sleep duration (short debug value)
//!
//! Configuration is stored at `~/.config/somnia/config.toml`. The test-mode
//! *toggle* is not configuration -- it lives in the persisted record.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::ConfigError;
use crate::session::MachineParams;

/// Alarm timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmConfig {
    /// Minutes of sleep before the alarm fires. Default: 8 hours.
    #[serde(default = "default_sleep_duration_min")]
    pub sleep_duration_min: u32,
    /// Minutes a wake interruption may last and still resume the session.
    #[serde(default = "default_grace_window_min")]
    pub grace_window_min: u32,
    /// Seconds until the alarm fires in test mode. Default: 1 minute.
    #[serde(default = "default_test_sleep_secs")]
    pub test_sleep_secs: u32,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/somnia/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub alarm: AlarmConfig,
}

fn default_sleep_duration_min() -> u32 {
    8 * 60
}
fn default_grace_window_min() -> u32 {
    60
}
fn default_test_sleep_secs() -> u32 {
    60
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            sleep_duration_min: default_sleep_duration_min(),
            grace_window_min: default_grace_window_min(),
            test_sleep_secs: default_test_sleep_secs(),
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/somnia"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load the configuration, falling back to defaults if the file does
    /// not exist yet.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::LoadFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        toml::from_str(&raw).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    /// Persist the configuration.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let raw = toml::to_string_pretty(self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        std::fs::write(&path, raw).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Validate the timing values. Zero durations make the transition table
    /// degenerate, so they are rejected at the edge.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.alarm.sleep_duration_min == 0 {
            return Err(ConfigError::InvalidValue {
                key: "alarm.sleep_duration_min".into(),
                message: "must be positive".into(),
            });
        }
        if self.alarm.grace_window_min == 0 {
            return Err(ConfigError::InvalidValue {
                key: "alarm.grace_window_min".into(),
                message: "must be positive".into(),
            });
        }
        if self.alarm.test_sleep_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "alarm.test_sleep_secs".into(),
                message: "must be positive".into(),
            });
        }
        Ok(())
    }

    /// The state machine parameters this configuration describes.
    pub fn machine_params(&self) -> MachineParams {
        MachineParams {
            sleep_duration: chrono::Duration::minutes(i64::from(self.alarm.sleep_duration_min)),
            grace_window: chrono::Duration::minutes(i64::from(self.alarm.grace_window_min)),
            test_sleep_duration: chrono::Duration::seconds(i64::from(self.alarm.test_sleep_secs)),
            ..MachineParams::default()
        }
    }
}
