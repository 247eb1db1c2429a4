//! Configuration management for Argus
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files.

use crate::error::{ArgusError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_true() -> bool {
    true
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Station status page configuration
    pub station: StationConfig,

    /// State machine and session tuning
    pub monitor: MonitorConfig,

    /// Notification transport configuration
    pub notify: NotifyConfig,

    /// Pricing configuration for cable-session cost summaries
    pub pricing: PricingConfig,

    /// External log hook configuration
    pub hook: HookConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Station status page parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// URL of the wallbox status page
    pub url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// State machine and session tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Power above which the station counts as charging (kW)
    pub charging_threshold_kw: f64,

    /// Consecutive unreachable samples tolerated before a forced disconnect
    pub offline_grace_samples: u32,

    /// Minutes between periodic charging-power updates
    pub rate_update_minutes: i64,

    /// Path of the persisted state file
    pub state_file: String,

    /// Timezone used for notification timestamps
    pub timezone: String,
}

/// Notification transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Discord webhook URL; empty disables the transport
    pub discord_webhook_url: String,

    /// ntfy transport settings
    pub ntfy: NtfyConfig,

    /// Pushover transport settings
    pub pushover: PushoverConfig,

    /// Per-send timeout in seconds
    pub timeout_secs: u64,
}

/// ntfy transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NtfyConfig {
    /// ntfy server base URL
    pub server: String,

    /// Topic to publish to; empty disables the transport
    pub topic: String,

    /// Optional access token
    pub token: String,
}

/// Pushover transport settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PushoverConfig {
    /// Application token; empty disables the transport
    pub token: String,

    /// User key
    pub user: String,
}

/// Pricing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Fixed price per kWh; cost lines are omitted when unset
    pub price_per_kwh: Option<f64>,

    /// Currency symbol
    pub currency_symbol: String,
}

/// External log hook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    /// Executable invoked once per transition; empty disables the hook
    pub command: String,

    /// Invocation timeout in seconds
    pub timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Directory for rotated log files
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    #[serde(default = "default_true")]
    pub console_output: bool,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: 30,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            charging_threshold_kw: 1.0,
            offline_grace_samples: 5,
            rate_update_minutes: 5,
            state_file: "/var/lib/argus/state.json".to_string(),
            timezone: "Europe/Berlin".to_string(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            discord_webhook_url: String::new(),
            ntfy: NtfyConfig::default(),
            pushover: PushoverConfig::default(),
            timeout_secs: 10,
        }
    }
}

impl Default for NtfyConfig {
    fn default() -> Self {
        Self {
            server: "https://ntfy.sh".to_string(),
            topic: String::new(),
            token: String::new(),
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            price_per_kwh: None,
            currency_symbol: "€".to_string(),
        }
    }
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            timeout_secs: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/var/log/argus".to_string(),
            backup_count: 5,
            console_output: true,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default locations
    pub fn load() -> Result<Self> {
        let default_paths = [
            "argus_config.yaml",
            "/data/argus_config.yaml",
            "/etc/argus/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.station.url.is_empty() {
            return Err(ArgusError::validation(
                "station.url",
                "Status page URL cannot be empty",
            ));
        }

        if self.station.timeout_secs == 0 {
            return Err(ArgusError::validation(
                "station.timeout_secs",
                "Must be greater than 0",
            ));
        }

        if self.monitor.charging_threshold_kw <= 0.0 {
            return Err(ArgusError::validation(
                "monitor.charging_threshold_kw",
                "Must be positive",
            ));
        }

        if self.monitor.offline_grace_samples == 0 {
            return Err(ArgusError::validation(
                "monitor.offline_grace_samples",
                "Must be at least 1",
            ));
        }

        if self.monitor.rate_update_minutes <= 0 {
            return Err(ArgusError::validation(
                "monitor.rate_update_minutes",
                "Must be at least 1",
            ));
        }

        if self.monitor.state_file.is_empty() {
            return Err(ArgusError::validation(
                "monitor.state_file",
                "State file path cannot be empty",
            ));
        }

        if self.monitor.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ArgusError::validation(
                "monitor.timezone",
                "Unknown timezone",
            ));
        }

        if let Some(price) = self.pricing.price_per_kwh
            && price <= 0.0
        {
            return Err(ArgusError::validation(
                "pricing.price_per_kwh",
                "Must be positive when set",
            ));
        }

        Ok(())
    }
}
