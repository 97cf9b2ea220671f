//! Desktop notification channel.
//!
//! Linux and the BSDs go through `notify-send` when it is on `PATH`; macOS
//! always has `osascript`. Other platforms have no integration. The platform
//! is probed once when the channel is built.
//!
//! The helper is killed if it has not exited within the configured timeout.

use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::sync::RwLock;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument};

use vigil_core::{Result, VigilError};

use super::{Channel, ChannelSettings, DESKTOP_NOTIFY, setting_bool, setting_i64, setting_level};
use crate::config::{DEFAULT_DESKTOP_TIMEOUT_SECS, DesktopNotifyConfig, positive_secs};
use crate::types::{Alert, AlertLevel};

/// How desktop notifications are delivered on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopPlatform {
    /// freedesktop `notify-send`
    NotifySend,
    /// macOS `osascript -e 'display notification ...'`
    AppleScript,
    /// No integration available
    Unsupported,
}

impl DesktopPlatform {
    /// Probe the current host.
    pub fn detect() -> Self {
        if cfg!(target_os = "macos") {
            DesktopPlatform::AppleScript
        } else if cfg!(any(
            target_os = "linux",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd"
        )) {
            match which::which("notify-send") {
                Ok(path) => {
                    debug!(path = %path.display(), "found notify-send");
                    DesktopPlatform::NotifySend
                }
                Err(_) => DesktopPlatform::Unsupported,
            }
        } else {
            DesktopPlatform::Unsupported
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, DesktopPlatform::Unsupported)
    }

    /// Helper program name, or `None` if unsupported.
    pub fn program(&self) -> Option<&'static str> {
        match self {
            DesktopPlatform::NotifySend => Some("notify-send"),
            DesktopPlatform::AppleScript => Some("osascript"),
            DesktopPlatform::Unsupported => None,
        }
    }

    /// Build the helper invocation for `alert`, or `None` if unsupported.
    pub fn command(&self, alert: &Alert, timeout: Duration) -> Option<Command> {
        let program = self.program()?;
        self.command_with(program, alert, timeout)
    }

    fn command_with(
        &self,
        program: impl AsRef<OsStr>,
        alert: &Alert,
        timeout: Duration,
    ) -> Option<Command> {
        let title = format!("[{}] {}", alert.level, alert.title);
        match self {
            DesktopPlatform::NotifySend => {
                let mut cmd = Command::new(program);
                cmd.arg("--urgency")
                    .arg(urgency(alert.level))
                    .arg("--icon")
                    .arg(icon(alert.level))
                    .arg("--expire-time")
                    .arg(timeout.as_millis().to_string())
                    .arg("--app-name")
                    .arg("vigil")
                    .arg(title)
                    .arg(&alert.message);
                Some(cmd)
            }
            DesktopPlatform::AppleScript => {
                let script = format!(
                    "display notification \"{}\" with title \"{}\" subtitle \"{}\"",
                    applescript_escape(&alert.message),
                    applescript_escape(&title),
                    applescript_escape(&alert.source),
                );
                let mut cmd = Command::new(program);
                cmd.arg("-e").arg(script);
                Some(cmd)
            }
            DesktopPlatform::Unsupported => None,
        }
    }
}

fn urgency(level: AlertLevel) -> &'static str {
    match level {
        AlertLevel::Info => "low",
        AlertLevel::Warning => "normal",
        AlertLevel::Error | AlertLevel::Critical => "critical",
    }
}

fn icon(level: AlertLevel) -> &'static str {
    match level {
        AlertLevel::Info => "dialog-information",
        AlertLevel::Warning => "dialog-warning",
        AlertLevel::Error | AlertLevel::Critical => "dialog-error",
    }
}

fn applescript_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Debug, Clone)]
struct DesktopSettings {
    enabled: bool,
    min_level: AlertLevel,
    timeout: Duration,
}

/// Sends alerts to the desktop notification daemon.
#[derive(Debug)]
pub struct DesktopNotifyChannel {
    platform: DesktopPlatform,
    helper: Option<OsString>,
    settings: RwLock<DesktopSettings>,
}

impl DesktopNotifyChannel {
    /// Create the channel, probing the host platform.
    pub fn new(config: &DesktopNotifyConfig) -> Self {
        Self::with_platform(config, DesktopPlatform::detect())
    }

    /// Create the channel for a known platform.
    pub fn with_platform(config: &DesktopNotifyConfig, platform: DesktopPlatform) -> Self {
        Self {
            platform,
            helper: None,
            settings: RwLock::new(DesktopSettings {
                enabled: config.enabled,
                min_level: config.min_level,
                timeout: config.timeout(),
            }),
        }
    }

    /// Run `program` instead of the platform's helper, with the same arguments.
    pub fn with_helper(mut self, program: impl Into<OsString>) -> Self {
        self.helper = Some(program.into());
        self
    }

    pub fn platform(&self) -> DesktopPlatform {
        self.platform
    }

    fn settings(&self) -> DesktopSettings {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Channel for DesktopNotifyChannel {
    fn name(&self) -> &str {
        DESKTOP_NOTIFY
    }

    fn is_enabled(&self) -> bool {
        self.settings().enabled && self.platform.is_available()
    }

    #[instrument(skip(self, alert), fields(alert_id = %alert.id))]
    async fn notify(&self, alert: &Alert) -> Result<()> {
        let settings = self.settings();
        let cmd = match &self.helper {
            Some(program) => self.platform.command_with(program, alert, settings.timeout),
            None => self.platform.command(alert, settings.timeout),
        };
        let Some(mut cmd) = cmd else {
            return Err(VigilError::unavailable(
                DESKTOP_NOTIFY,
                "no desktop notification helper on this platform",
            ));
        };
        if alert.level < settings.min_level {
            return Ok(());
        }

        cmd.kill_on_drop(true);
        let output = tokio::time::timeout(settings.timeout, cmd.output())
            .await
            .map_err(|_| {
                VigilError::delivery(
                    DESKTOP_NOTIFY,
                    format!("helper did not exit within {}s", settings.timeout.as_secs()),
                )
            })?
            .map_err(|e| {
                VigilError::delivery(DESKTOP_NOTIFY, format!("failed to run helper: {e}"))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VigilError::delivery(
                DESKTOP_NOTIFY,
                format!("helper exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        debug!("desktop notification sent");
        Ok(())
    }

    fn configure(&self, settings: &ChannelSettings) -> Result<()> {
        let enabled = setting_bool(DESKTOP_NOTIFY, settings, "enabled")?;
        let min_level = setting_level(DESKTOP_NOTIFY, settings, "min_level")?;
        let timeout = setting_i64(DESKTOP_NOTIFY, settings, "timeout_seconds")?;

        let mut current = self.settings.write().unwrap_or_else(|e| e.into_inner());
        if let Some(enabled) = enabled {
            current.enabled = enabled;
        }
        if let Some(level) = min_level {
            current.min_level = level;
        }
        if let Some(secs) = timeout {
            current.timeout = positive_secs(secs, DEFAULT_DESKTOP_TIMEOUT_SECS);
        }
        Ok(())
    }
}
