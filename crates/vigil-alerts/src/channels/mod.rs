//! Alert delivery channels.
//!
//! Every channel implements [`Channel`]; the dispatcher keeps them in a map
//! keyed by [`Channel::name`] and never branches on the concrete type.

mod bell;
mod desktop;
mod log_file;
mod webhook;

pub use bell::{BELL_REPEAT_DELAY, TerminalBellChannel};
pub use desktop::{DesktopNotifyChannel, DesktopPlatform};
pub use log_file::LogFileChannel;
pub use webhook::{WebhookChannel, WebhookPayload};

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::error;

use vigil_core::{Result, VigilError};

use crate::config::NotificationConfig;
use crate::types::{Alert, AlertLevel};

/// Name of the terminal bell channel.
pub const TERMINAL_BELL: &str = "terminal_bell";
/// Name of the log file channel.
pub const LOG_FILE: &str = "log_file";
/// Name of the desktop notification channel.
pub const DESKTOP_NOTIFY: &str = "desktop_notify";
/// Name of the webhook channel.
pub const WEBHOOK: &str = "webhook";

/// Settings map accepted by [`Channel::configure`], keyed like the JSON config.
pub type ChannelSettings = serde_json::Map<String, serde_json::Value>;

/// A pluggable alert delivery mechanism.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Stable channel name.
    fn name(&self) -> &str;

    /// Whether the channel is switched on and usable on this host.
    fn is_enabled(&self) -> bool;

    /// Deliver one alert. Alerts below the channel's own minimum level are
    /// skipped successfully.
    async fn notify(&self, alert: &Alert) -> Result<()>;

    /// Apply a partial settings update. Keys not present are left unchanged.
    fn configure(&self, settings: &ChannelSettings) -> Result<()>;
}

/// Build the full channel set described by `config`.
pub fn build_channels(config: &NotificationConfig) -> BTreeMap<String, Arc<dyn Channel>> {
    let mut channels: BTreeMap<String, Arc<dyn Channel>> = BTreeMap::new();

    channels.insert(
        TERMINAL_BELL.to_string(),
        Arc::new(TerminalBellChannel::new(&config.terminal_bell)),
    );
    channels.insert(
        LOG_FILE.to_string(),
        Arc::new(LogFileChannel::new(&config.log_file)),
    );
    channels.insert(
        DESKTOP_NOTIFY.to_string(),
        Arc::new(DesktopNotifyChannel::new(&config.desktop_notify)),
    );
    match WebhookChannel::new(&config.webhook) {
        Ok(webhook) => {
            channels.insert(WEBHOOK.to_string(), Arc::new(webhook));
        }
        Err(e) => error!(error = %e, "webhook channel disabled: cannot build HTTP client"),
    }

    channels
}

fn invalid(channel: &str, key: &str, kind: &str) -> VigilError {
    VigilError::channel_config(channel, format!("{key} must be {kind}"))
}

pub(crate) fn setting_bool(
    channel: &str,
    settings: &ChannelSettings,
    key: &str,
) -> Result<Option<bool>> {
    settings
        .get(key)
        .map(|v| v.as_bool().ok_or_else(|| invalid(channel, key, "a boolean")))
        .transpose()
}

pub(crate) fn setting_i64(
    channel: &str,
    settings: &ChannelSettings,
    key: &str,
) -> Result<Option<i64>> {
    settings
        .get(key)
        .map(|v| v.as_i64().ok_or_else(|| invalid(channel, key, "an integer")))
        .transpose()
}

pub(crate) fn setting_string(
    channel: &str,
    settings: &ChannelSettings,
    key: &str,
) -> Result<Option<String>> {
    settings
        .get(key)
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid(channel, key, "a string"))
        })
        .transpose()
}

pub(crate) fn setting_level(
    channel: &str,
    settings: &ChannelSettings,
    key: &str,
) -> Result<Option<AlertLevel>> {
    setting_string(channel, settings, key)?
        .map(|s| {
            s.parse::<AlertLevel>()
                .map_err(|e| VigilError::channel_config(channel, e.to_string()))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(value: serde_json::Value) -> ChannelSettings {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_build_channels_has_all_four() {
        let channels = build_channels(&NotificationConfig::default());
        let names: Vec<&str> = channels.keys().map(String::as_str).collect();
        assert_eq!(names, vec![DESKTOP_NOTIFY, LOG_FILE, TERMINAL_BELL, WEBHOOK]);
        for (name, channel) in &channels {
            assert_eq!(channel.name(), name);
        }
    }

    #[test]
    fn test_setting_helpers() {
        let s = settings(json!({
            "enabled": true,
            "retry_count": 4,
            "min_level": "error",
            "url": 7
        }));
        assert_eq!(setting_bool("c", &s, "enabled").unwrap(), Some(true));
        assert_eq!(setting_i64("c", &s, "retry_count").unwrap(), Some(4));
        assert_eq!(setting_level("c", &s, "min_level").unwrap(), Some(AlertLevel::Error));
        assert_eq!(setting_bool("c", &s, "missing").unwrap(), None);
        assert!(setting_string("c", &s, "url").is_err());
        assert!(setting_bool("c", &s, "retry_count").is_err());
    }
}
