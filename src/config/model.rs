//! Configuration model
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::device::DEFAULT_BAUD_RATE;
use crate::error::{ControllerError, Result};
use crate::runner::{AdaptiveVoltage, ChannelSelection, VoltagePoint, DEFAULT_POINTS};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub run: RunConfig,

    /// Curve used by `adaptive-voltage` cycle/mod steps
    #[serde(default)]
    pub adaptive_voltage: AdaptiveVoltageConfig,

    #[serde(default)]
    pub state: StateConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// Serial link settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerialConfig {
    /// Port to use instead of auto-detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Read timeout per response line
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_timeout_ms() -> u64 {
    1000
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Sequence execution settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    /// Default channel selector: `1`, `2` or `both`
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Command file used when `--csv` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands_file: Option<String>,

    /// Replace every wait with this many seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_override: Option<f64>,

    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Read the device back after freq/stop steps
    #[serde(default)]
    pub report_device_state: bool,
}

fn default_channel() -> String {
    "both".to_string()
}

fn default_tick_interval_ms() -> u64 {
    250
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            commands_file: None,
            wait_override: None,
            tick_interval_ms: default_tick_interval_ms(),
            report_device_state: false,
        }
    }
}

impl RunConfig {
    /// # Errors
    ///
    /// Fails when `channel` is not a known selector.
    pub fn channel_selection(&self) -> Result<ChannelSelection> {
        self.channel
            .parse()
            .map_err(|e: String| ControllerError::Config(format!("run.channel: {}", e)))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(10))
    }

    pub fn commands_file_path(&self) -> Option<PathBuf> {
        self.commands_file.as_deref().map(expand_path)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdaptiveVoltageConfig {
    #[serde(default = "default_points")]
    pub points: Vec<VoltagePoint>,
}

fn default_points() -> Vec<VoltagePoint> {
    DEFAULT_POINTS.to_vec()
}

impl Default for AdaptiveVoltageConfig {
    fn default() -> Self {
        Self {
            points: default_points(),
        }
    }
}

impl AdaptiveVoltageConfig {
    pub fn curve(&self) -> Result<AdaptiveVoltage> {
        AdaptiveVoltage::new(self.points.clone())
    }
}

/// Where settings and resume data live
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct StateConfig {
    /// Overrides the platform default settings file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_path: Option<String>,
}

impl StateConfig {
    pub fn settings_path(&self) -> Option<PathBuf> {
        self.settings_path.as_deref().map(expand_path)
    }
}

/// Log output settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. `info`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Emit JSON lines instead of text
    #[serde(default)]
    pub json: bool,
}

/// Expand `~` and environment variables in a configured path
///
/// Unknown variables leave the path unchanged.
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => {
            tracing::debug!("Could not expand '{}': {}", raw, e);
            PathBuf::from(raw)
        }
    }
}
