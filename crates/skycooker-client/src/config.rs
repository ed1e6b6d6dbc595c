//! Driver configuration.
//!
//! Loaded from TOML; every field has a default so a file only needs the
//! device address and key:
//!
//! ```toml
//! [device]
//! address = "AA:BB:CC:DD:EE:FF"
//! key = "b54c75b1b40c88ef"
//! persistent = false
//!
//! [timing]
//! command_retries = 3
//! ```

use serde::{Deserialize, Serialize};
use skycooker_core::{AuthKey, Error, ModelFamily, Result, constants::*};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration for one cooker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CookerConfig {
    /// Identity of the device.
    pub device: DeviceConfig,
    /// Timeouts and retry budgets.
    pub timing: TimingConfig,
}

/// Device identity and link policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// BLE address of the cooker.
    pub address: String,
    /// Pre-shared key, 16 hex digits.
    pub key: AuthKey,
    /// Marketing model name, e.g. `RMC-M40S`.
    pub model: String,
    /// Keep the link open between updates.
    pub persistent: bool,
}

/// Timeouts and retry budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Receive timeout applied to every command, replacing the per-command table.
    pub command_timeout_ms: Option<u64>,
    /// Extra dispatcher attempts after the first.
    pub command_retries: u32,
    /// Base unit of the dispatcher backoff.
    pub retry_base_delay_ms: u64,
    /// Initial mailbox poll interval.
    pub poll_interval_ms: u64,
    /// Poll interval ceiling.
    pub max_poll_interval_ms: u64,
    /// Whole-cycle attempts per update.
    pub update_tries: u32,
    /// Pause between whole-cycle attempts.
    pub update_retry_interval_ms: u64,
    /// Bound on link teardown.
    pub disconnect_timeout_ms: u64,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            key: AuthKey::new([0; AUTH_KEY_LEN]),
            model: "RMC-M40S".into(),
            persistent: true,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: None,
            command_retries: DEFAULT_COMMAND_RETRIES,
            retry_base_delay_ms: RETRY_BASE_DELAY_MS,
            poll_interval_ms: POLL_INTERVAL_MS,
            max_poll_interval_ms: MAX_POLL_INTERVAL_MS,
            update_tries: DEFAULT_UPDATE_TRIES,
            update_retry_interval_ms: UPDATE_RETRY_INTERVAL_MS,
            disconnect_timeout_ms: DISCONNECT_TIMEOUT_MS,
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl CookerConfig {
    /// Build a configuration for `address` and `key` with default timing.
    pub fn new(address: impl Into<String>, key: AuthKey) -> Self {
        Self {
            device: DeviceConfig {
                address: address.into(),
                key,
                ..DeviceConfig::default()
            },
            timing: TimingConfig::default(),
        }
    }

    /// Parse and validate a TOML document.
    ///
    /// # Errors
    /// Returns `Error::Config` on malformed TOML or failed validation, and
    /// `Error::UnsupportedModel` for models this driver does not speak.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| Error::config(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Cannot read {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Self::from_toml_str(&contents)
    }

    /// Serialize back to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.device.address.trim().is_empty() {
            return Err(Error::config("Device address is required"));
        }
        ModelFamily::supported(&self.device.model)?;
        self.timing.validate()
    }
}

impl TimingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.update_tries == 0 {
            return Err(Error::config("update_tries must be at least 1"));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::config("poll_interval_ms must be positive"));
        }
        if self.poll_interval_ms > self.max_poll_interval_ms {
            return Err(Error::config(format!(
                "poll_interval_ms ({}) exceeds max_poll_interval_ms ({})",
                self.poll_interval_ms, self.max_poll_interval_ms
            )));
        }
        if self.command_timeout_ms == Some(0) {
            return Err(Error::config("command_timeout_ms must be positive"));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_ms.map(Duration::from_millis)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_poll_interval(&self) -> Duration {
        Duration::from_millis(self.max_poll_interval_ms)
    }

    pub fn update_retry_interval(&self) -> Duration {
        Duration::from_millis(self.update_retry_interval_ms)
    }

    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_timeout_ms)
    }
}
