//! Log file channel.
//!
//! The dispatcher writes every alert to the [`AlertLogger`](crate::logger::AlertLogger)
//! before any channel runs, so this channel has nothing left to do. It exists
//! so the log shows up alongside the other channels in status listings.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::RwLock;

use vigil_core::Result;

use super::{Channel, ChannelSettings, LOG_FILE, setting_bool, setting_string};
use crate::config::LogFileConfig;
use crate::types::Alert;

#[derive(Debug, Clone)]
struct LogFileSettings {
    enabled: bool,
    path: PathBuf,
}

/// Placeholder channel for the always-on alert log.
#[derive(Debug)]
pub struct LogFileChannel {
    settings: RwLock<LogFileSettings>,
}

impl LogFileChannel {
    pub fn new(config: &LogFileConfig) -> Self {
        Self {
            settings: RwLock::new(LogFileSettings {
                enabled: config.enabled,
                path: config.path.clone(),
            }),
        }
    }

    /// Configured log location.
    pub fn path(&self) -> PathBuf {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .path
            .clone()
    }
}

#[async_trait]
impl Channel for LogFileChannel {
    fn name(&self) -> &str {
        LOG_FILE
    }

    fn is_enabled(&self) -> bool {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .enabled
    }

    async fn notify(&self, _alert: &Alert) -> Result<()> {
        Ok(())
    }

    fn configure(&self, settings: &ChannelSettings) -> Result<()> {
        let enabled = setting_bool(LOG_FILE, settings, "enabled")?;
        let path = setting_string(LOG_FILE, settings, "path")?;

        let mut current = self.settings.write().unwrap_or_else(|e| e.into_inner());
        if let Some(enabled) = enabled {
            current.enabled = enabled;
        }
        if let Some(path) = path {
            current.path = PathBuf::from(path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AlertLevel;
    use serde_json::json;

    #[tokio::test]
    async fn test_notify_always_succeeds() {
        let channel = LogFileChannel::new(&LogFileConfig::default());
        assert!(channel.is_enabled());
        channel
            .notify(&Alert::new(AlertLevel::Critical, "t", "m", "s"))
            .await
            .unwrap();

        let settings = json!({"enabled": false, "path": "/tmp/elsewhere.log"});
        channel.configure(settings.as_object().unwrap()).unwrap();
        assert!(!channel.is_enabled());
        assert_eq!(channel.path(), PathBuf::from("/tmp/elsewhere.log"));
    }
}
