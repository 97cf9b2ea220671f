//! Terminal bell channel.

use async_trait::async_trait;
use std::io::Write;
use std::sync::{Mutex, RwLock};
use std::time::Duration;
use tracing::debug;

use vigil_core::Result;

use super::{Channel, ChannelSettings, TERMINAL_BELL, setting_bool, setting_i64, setting_level};
use crate::config::TerminalBellConfig;
use crate::types::{Alert, AlertLevel};

/// Pause between repeated bells for critical alerts.
pub const BELL_REPEAT_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
struct BellSettings {
    enabled: bool,
    min_level: AlertLevel,
    repeat_count: u32,
}

/// Rings the terminal bell (BEL, 0x07) for alerts at or above its level.
///
/// Critical alerts ring `repeat_count` times.
pub struct TerminalBellChannel {
    settings: RwLock<BellSettings>,
    out: Mutex<Box<dyn Write + Send>>,
    repeat_delay: Duration,
}

impl TerminalBellChannel {
    /// Create a bell channel writing to stdout.
    pub fn new(config: &TerminalBellConfig) -> Self {
        Self::with_writer(config, Box::new(std::io::stdout()))
    }

    /// Create a bell channel writing to `out`.
    pub fn with_writer(config: &TerminalBellConfig, out: Box<dyn Write + Send>) -> Self {
        Self {
            settings: RwLock::new(BellSettings {
                enabled: config.enabled,
                min_level: config.min_level,
                repeat_count: config.repeat_count,
            }),
            out: Mutex::new(out),
            repeat_delay: BELL_REPEAT_DELAY,
        }
    }

    /// Override the delay between repeated bells.
    pub fn with_repeat_delay(mut self, delay: Duration) -> Self {
        self.repeat_delay = delay;
        self
    }

    fn settings(&self) -> BellSettings {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of bells rung for `level`, zero if the level is gated out.
    fn rings_for(&self, level: AlertLevel) -> u32 {
        let settings = self.settings();
        if level < settings.min_level {
            0
        } else if level == AlertLevel::Critical && settings.repeat_count > 1 {
            settings.repeat_count
        } else {
            1
        }
    }

    fn ring(&self) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        // Bell output errors are ignored.
        let _ = out.write_all(b"\x07");
        let _ = out.flush();
    }
}

#[async_trait]
impl Channel for TerminalBellChannel {
    fn name(&self) -> &str {
        TERMINAL_BELL
    }

    fn is_enabled(&self) -> bool {
        self.settings().enabled
    }

    async fn notify(&self, alert: &Alert) -> Result<()> {
        let rings = self.rings_for(alert.level);
        if rings == 0 {
            return Ok(());
        }
        debug!(alert_id = %alert.id, rings, "ringing terminal bell");

        for i in 0..rings {
            if i > 0 {
                tokio::time::sleep(self.repeat_delay).await;
            }
            self.ring();
        }
        Ok(())
    }

    fn configure(&self, settings: &ChannelSettings) -> Result<()> {
        let enabled = setting_bool(TERMINAL_BELL, settings, "enabled")?;
        let min_level = setting_level(TERMINAL_BELL, settings, "min_level")?;
        let repeat = setting_i64(TERMINAL_BELL, settings, "repeat_count")?;

        let mut current = self.settings.write().unwrap_or_else(|e| e.into_inner());
        if let Some(enabled) = enabled {
            current.enabled = enabled;
        }
        if let Some(level) = min_level {
            current.min_level = level;
        }
        if let Some(repeat) = repeat {
            current.repeat_count = u32::try_from(repeat.max(1)).unwrap_or(u32::MAX);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn channel(buf: &SharedBuf) -> TerminalBellChannel {
        TerminalBellChannel::with_writer(&TerminalBellConfig::default(), Box::new(buf.clone()))
            .with_repeat_delay(Duration::from_millis(1))
    }

    fn bells(buf: &SharedBuf) -> usize {
        buf.0.lock().unwrap().iter().filter(|b| **b == 0x07).count()
    }

    #[tokio::test]
    async fn test_below_min_level_is_silent() {
        let buf = SharedBuf::default();
        let bell = channel(&buf);
        bell.notify(&Alert::new(AlertLevel::Warning, "t", "m", "s"))
            .await
            .unwrap();
        assert_eq!(bells(&buf), 0);
    }

    #[tokio::test]
    async fn test_error_rings_once_critical_repeats() {
        let buf = SharedBuf::default();
        let bell = channel(&buf);

        bell.notify(&Alert::new(AlertLevel::Error, "t", "m", "s"))
            .await
            .unwrap();
        assert_eq!(bells(&buf), 1);

        bell.notify(&Alert::new(AlertLevel::Critical, "t", "m", "s"))
            .await
            .unwrap();
        assert_eq!(bells(&buf), 4);
    }

    #[tokio::test]
    async fn test_configure_updates_gate() {
        let buf = SharedBuf::default();
        let bell = channel(&buf);
        let settings = json!({"min_level": "info", "repeat_count": 1, "enabled": false});
        bell.configure(settings.as_object().unwrap()).unwrap();

        assert!(!bell.is_enabled());
        bell.notify(&Alert::new(AlertLevel::Critical, "t", "m", "s"))
            .await
            .unwrap();
        assert_eq!(bells(&buf), 1);

        let bad = json!({"min_level": "deafening"});
        assert!(bell.configure(bad.as_object().unwrap()).is_err());
    }
}
