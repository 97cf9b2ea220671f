//! Notification settings.
//!
//! Stored as JSON at `~/.vigil/notifications.json`. A missing or unreadable
//! file is not an error: defaults are used and nothing is written until the
//! operator saves settings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use vigil_core::{Result, VigilError, paths};

use crate::types::AlertLevel;

/// Default webhook request timeout in seconds.
pub const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 10;

/// Default webhook attempt count.
pub const DEFAULT_WEBHOOK_RETRY_COUNT: u32 = 3;

/// Default desktop notification display time in seconds.
pub const DEFAULT_DESKTOP_TIMEOUT_SECS: u64 = 10;

/// Complete notification configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Master switch for all notifications
    pub enabled: bool,
    /// Alerts below this level are neither logged nor dispatched
    pub min_level: AlertLevel,
    /// Terminal bell channel
    pub terminal_bell: TerminalBellConfig,
    /// Alert log channel
    pub log_file: LogFileConfig,
    /// Desktop notification channel
    pub desktop_notify: DesktopNotifyConfig,
    /// Webhook channel
    pub webhook: WebhookConfig,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_level: AlertLevel::Warning,
            terminal_bell: TerminalBellConfig::default(),
            log_file: LogFileConfig::default(),
            desktop_notify: DesktopNotifyConfig::default(),
            webhook: WebhookConfig::default(),
        }
    }
}

/// Terminal bell settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalBellConfig {
    pub enabled: bool,
    pub min_level: AlertLevel,
    /// Bells rung for critical alerts
    pub repeat_count: u32,
}

impl Default for TerminalBellConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_level: AlertLevel::Error,
            repeat_count: 3,
        }
    }
}

/// Alert log settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogFileConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for LogFileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: paths::default_alert_log_path()
                .unwrap_or_else(|_| PathBuf::from("vigil-alerts.log")),
        }
    }
}

/// Desktop notification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopNotifyConfig {
    pub enabled: bool,
    pub min_level: AlertLevel,
    pub timeout_seconds: i64,
}

impl Default for DesktopNotifyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_level: AlertLevel::Error,
            timeout_seconds: DEFAULT_DESKTOP_TIMEOUT_SECS as i64,
        }
    }
}

impl DesktopNotifyConfig {
    /// Display time and helper time limit, falling back to the default for zero or negative values.
    pub fn timeout(&self) -> Duration {
        positive_secs(self.timeout_seconds, DEFAULT_DESKTOP_TIMEOUT_SECS)
    }
}

/// Webhook settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub enabled: bool,
    pub url: String,
    pub min_level: AlertLevel,
    /// Extra request headers (e.g. `Authorization`)
    pub headers: BTreeMap<String, String>,
    pub timeout_seconds: i64,
    /// Total delivery attempts
    pub retry_count: i64,
    /// Reported as `cluster_name` in the payload
    pub cluster_name: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            min_level: AlertLevel::Warning,
            headers: BTreeMap::new(),
            timeout_seconds: DEFAULT_WEBHOOK_TIMEOUT_SECS as i64,
            retry_count: DEFAULT_WEBHOOK_RETRY_COUNT as i64,
            cluster_name: "default".to_string(),
        }
    }
}

impl WebhookConfig {
    /// Request timeout, falling back to the default for zero or negative values.
    pub fn timeout(&self) -> Duration {
        positive_secs(self.timeout_seconds, DEFAULT_WEBHOOK_TIMEOUT_SECS)
    }

    /// Attempt count, falling back to the default for zero or negative values.
    pub fn attempts(&self) -> u32 {
        effective_retry_count(self.retry_count)
    }
}

pub(crate) fn positive_secs(value: i64, default: u64) -> Duration {
    if value > 0 {
        Duration::from_secs(value as u64)
    } else {
        Duration::from_secs(default)
    }
}

pub(crate) fn effective_retry_count(value: i64) -> u32 {
    if value > 0 {
        u32::try_from(value).unwrap_or(u32::MAX)
    } else {
        DEFAULT_WEBHOOK_RETRY_COUNT
    }
}

impl NotificationConfig {
    /// Load settings from `path`, substituting defaults if the file is missing
    /// or cannot be parsed.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(Some(config)) => {
                debug!(path = %path.display(), "loaded notification config");
                config
            }
            Ok(None) => {
                debug!(path = %path.display(), "no notification config, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "ignoring unreadable notification config"
                );
                Self::default()
            }
        }
    }

    /// Load settings from `~/.vigil/notifications.json`.
    pub fn load_default() -> Self {
        match paths::default_config_path() {
            Ok(path) => Self::load(&path),
            Err(e) => {
                warn!(error = %e, "no config location, using default notification settings");
                Self::default()
            }
        }
    }

    /// Load settings, returning `Ok(None)` when the file does not exist.
    pub fn try_load(path: &Path) -> Result<Option<Self>> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(VigilError::io("reading notification config", path, e)),
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| VigilError::ConfigInvalid {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    /// Write settings to `path` as pretty JSON, creating the parent directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| VigilError::ConfigPersist {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| VigilError::json("notification config", e))?;

        std::fs::write(path, json).map_err(|e| VigilError::ConfigPersist {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
