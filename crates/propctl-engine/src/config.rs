//! Engine configuration
//!
//! Loaded from TOML; every key has a default so an empty file is valid.
//! Selected keys can be overridden from the environment.

#![allow(clippy::result_large_err)]

use std::path::Path;
use std::time::Duration;

use propctl_core::errors::{ExError, ExErrorKind};
use propctl_store::errors::Result;
use serde::{Deserialize, Serialize};

pub const ENV_POLL_INTERVAL_SECS: &str = "PROPCTL_POLL_INTERVAL_SECS";
pub const ENV_MAX_WARNING_ACK_RETRIES: &str = "PROPCTL_MAX_WARNING_ACK_RETRIES";
pub const ENV_ACCOUNT_SWITCH_KEY: &str = "PROPCTL_ACCOUNT_SWITCH_KEY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Fixed delay before each activation status poll
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Ceiling on automatic warning-acknowledgement resubmissions
    #[serde(default = "default_max_warning_ack_retries")]
    pub max_warning_ack_retries: u32,

    /// Extra attempts after a transient network failure on list calls
    #[serde(default = "default_list_retry_attempts")]
    pub list_retry_attempts: u32,

    /// Appended as `accountSwitchKey` to every request when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_switch_key: Option<String>,

    #[serde(default)]
    pub notify_emails: Vec<String>,

    #[serde(default = "default_note")]
    pub default_note: String,
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_max_warning_ack_retries() -> u32 {
    1
}

fn default_list_retry_attempts() -> u32 {
    1
}

fn default_note() -> String {
    "Activated by propctl".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_warning_ack_retries: default_max_warning_ack_retries(),
            list_retry_attempts: default_list_retry_attempts(),
            account_switch_key: None,
            notify_emails: Vec::new(),
            default_note: default_note(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// `InvalidInput` for malformed TOML, unknown keys or invalid values.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content).map_err(|e| {
            invalid("config_parse", format!("invalid engine config: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment overrides
    ///
    /// # Errors
    ///
    /// `NotFound`/`Io` when the file cannot be read, `InvalidInput` as for
    /// [`EngineConfig::from_toml_str`] and [`EngineConfig::apply_env_overrides`].
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            let kind = if e.kind() == std::io::ErrorKind::NotFound {
                ExErrorKind::NotFound
            } else {
                ExErrorKind::Io
            };
            ExError::new(kind)
                .with_op("config_load")
                .with_message(format!("{}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    ///
    /// # Errors
    ///
    /// `InvalidInput` when an override is set but not a valid value.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides read through `lookup`
    ///
    /// # Errors
    ///
    /// `InvalidInput` when an override is set but not a valid value.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_SECS) {
            self.poll_interval_secs = parse_override(ENV_POLL_INTERVAL_SECS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_WARNING_ACK_RETRIES) {
            self.max_warning_ack_retries = parse_override(ENV_MAX_WARNING_ACK_RETRIES, &raw)?;
        }
        if let Some(raw) = lookup(ENV_ACCOUNT_SWITCH_KEY) {
            let trimmed = raw.trim();
            self.account_switch_key = (!trimmed.is_empty()).then(|| trimmed.to_string());
        }
        self.validate()
    }

    /// # Errors
    ///
    /// `InvalidInput` when `poll_interval_secs` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(invalid(
                "config_validate",
                "poll_interval_secs must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn parse_override<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| invalid("config_env", format!("{} has invalid value '{}'", name, raw)))
}

fn invalid(op: &str, message: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::InvalidInput)
        .with_op(op)
        .with_message(message)
}
