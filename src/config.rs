//! Configuration for the deferred notification scheduler.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{NotifyError, Result};
use crate::notify_dirs;
use crate::scheduler::tasks::{DEFAULT_DELAY_SECS, Importance};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Scheduling defaults and state location.
    pub scheduler: SchedulerConfig,
    /// Channel used when a trigger leaves channel fields unset.
    pub channel: ChannelDefaults,
    /// Log filter and sinks.
    pub logging: LoggingConfig,
}

/// Scheduling defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Delay applied when a trigger does not set one.
    pub default_delay_secs: u64,
    /// Directory for the identifier store, work queue and fire ledger.
    /// `None` = [`notify_dirs::data_dir`].
    pub state_dir: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_delay_secs: DEFAULT_DELAY_SECS,
            state_dir: None,
        }
    }
}

impl SchedulerConfig {
    /// Effective state directory.
    #[must_use]
    pub fn resolved_state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(notify_dirs::data_dir)
    }
}

/// Default notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelDefaults {
    pub default_channel_id: String,
    pub default_channel_name: String,
    pub importance: Importance,
    pub show_badge: bool,
}

impl Default for ChannelDefaults {
    fn default() -> Self {
        Self {
            default_channel_id: "deferred-notify-default".to_owned(),
            default_channel_name: "Deferred notifications".to_owned(),
            importance: Importance::Default,
            show_badge: true,
        }
    }
}

/// Logging settings. `RUST_LOG` takes precedence over `filter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    /// Also write a daily rolling log under [`notify_dirs::logs_dir`].
    pub log_to_file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "deferred_notify=info".to_owned(),
            log_to_file: false,
        }
    }
}

impl NotifyConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| NotifyError::Config(e.to_string()))
    }

    /// Load from `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| NotifyError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        notify_dirs::config_file()
    }
}
