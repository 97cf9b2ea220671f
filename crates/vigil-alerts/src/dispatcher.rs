//! Notification dispatcher.
//!
//! The production [`Notifier`]: applies the global enable/level gate, writes
//! the alert log, then fans out to every enabled channel concurrently. A
//! channel failure is logged and never affects its siblings.

use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, instrument, warn};

use vigil_core::{Result, paths};

use crate::channels::{Channel, build_channels};
use crate::config::NotificationConfig;
use crate::logger::AlertLogger;
use crate::store::Notifier;
use crate::types::{Alert, AlertLevel};

/// Source name of operator-triggered test alerts.
pub const TEST_ALERT_SOURCE: &str = "vigil";

struct DispatchState {
    config: Arc<NotificationConfig>,
    channels: BTreeMap<String, Arc<dyn Channel>>,
    logger: Arc<AlertLogger>,
}

impl DispatchState {
    /// `logger` is reused when it already writes to the configured path.
    fn build(config: NotificationConfig, logger: Option<Arc<AlertLogger>>) -> Self {
        let logger = logger
            .filter(|logger| logger.path() == config.log_file.path)
            .unwrap_or_else(|| Arc::new(AlertLogger::new(config.log_file.path.clone())));
        let channels = build_channels(&config);
        Self {
            config: Arc::new(config),
            channels,
            logger,
        }
    }
}

/// Routes alerts to the alert log and the configured channels.
pub struct NotificationDispatcher {
    config_path: PathBuf,
    state: RwLock<DispatchState>,
}

impl NotificationDispatcher {
    /// Load settings from `config_path`, using defaults if it is missing or invalid.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        let config_path = config_path.into();
        let config = NotificationConfig::load(&config_path);
        Self::with_config(config_path, config)
    }

    /// Load settings from `~/.vigil/notifications.json`.
    pub fn from_default_path() -> Result<Self> {
        Ok(Self::new(paths::default_config_path()?))
    }

    /// Use `config` directly.
    ///
    /// `config_path` is only written by [`update_config`](Self::update_config).
    pub fn with_config(config_path: impl Into<PathBuf>, config: NotificationConfig) -> Self {
        Self {
            config_path: config_path.into(),
            state: RwLock::new(DispatchState::build(config, None)),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Current settings.
    pub fn get_config(&self) -> Arc<NotificationConfig> {
        Arc::clone(&self.read_state().config)
    }

    /// Replace the settings, rebuild every channel, and persist.
    ///
    /// The alert logger is kept while the log path is unchanged, so in-flight
    /// deliveries and new ones share one writer. The new settings are live
    /// even when persisting fails; the error only means the file on disk is
    /// stale.
    #[instrument(skip(self, config), fields(path = %self.config_path.display()))]
    pub fn update_config(&self, config: NotificationConfig) -> Result<()> {
        let persisted = {
            let mut current = self.state.write().unwrap_or_else(|e| e.into_inner());
            let state = DispatchState::build(config, Some(Arc::clone(&current.logger)));
            let persisted = Arc::clone(&state.config);
            *current = state;
            persisted
        };
        info!(channels = self.read_state().channels.len(), "notification settings replaced");

        persisted.save(&self.config_path)
    }

    /// `(name, enabled)` for every channel, sorted by name.
    pub fn channel_status(&self) -> Vec<(String, bool)> {
        self.read_state()
            .channels
            .iter()
            .map(|(name, channel)| (name.clone(), channel.is_enabled()))
            .collect()
    }

    /// Look up a channel by name.
    pub fn channel(&self, name: &str) -> Option<Arc<dyn Channel>> {
        self.read_state().channels.get(name).cloned()
    }

    /// Add or replace a channel. Dropped again on the next [`update_config`](Self::update_config).
    pub fn insert_channel(&self, channel: Arc<dyn Channel>) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.channels.insert(channel.name().to_string(), channel);
    }

    /// Deliver an alert through the log and every enabled channel.
    ///
    /// Returns the alert log error, if any. Channels are dispatched either way.
    pub async fn notify(&self, alert: &Alert) -> Result<()> {
        let config = self.get_config();
        if !config.enabled || alert.level < config.min_level {
            debug!(
                alert_id = %alert.id,
                level = %alert.level,
                "alert below notification threshold"
            );
            return Ok(());
        }
        self.deliver(alert).await
    }

    /// Send an Info alert to every enabled channel, ignoring the global level.
    pub async fn send_test_notification(&self) -> Result<()> {
        if !self.get_config().enabled {
            warn!("notifications are disabled; test notification not sent");
            return Ok(());
        }
        let now = chrono::Utc::now();
        let alert = Alert::new(
            AlertLevel::Info,
            "Test notification",
            "Vigil notifications are working.",
            TEST_ALERT_SOURCE,
        )
        .with_id(Alert::generate_id(TEST_ALERT_SOURCE, now));
        self.deliver(&Alert { timestamp: now, ..alert }).await
    }

    #[instrument(skip(self, alert), fields(alert_id = %alert.id, level = %alert.level))]
    async fn deliver(&self, alert: &Alert) -> Result<()> {
        let (logger, channels) = {
            let state = self.read_state();
            let channels: Vec<Arc<dyn Channel>> = state
                .channels
                .values()
                .filter(|c| c.is_enabled())
                .cloned()
                .collect();
            (Arc::clone(&state.logger), channels)
        };

        let logged = logger.log_alert(alert).await;
        if let Err(e) = &logged {
            error!(error = %e, path = %logger.path().display(), "failed to write alert log");
        }

        let tasks = channels.into_iter().map(|channel| {
            let alert = alert.clone();
            let name = channel.name().to_string();
            let handle = tokio::spawn(async move { channel.notify(&alert).await });
            async move { (name, handle.await) }
        });

        for (name, outcome) in join_all(tasks).await {
            match outcome {
                Ok(Ok(())) => debug!(channel = %name, "channel delivered"),
                Ok(Err(e)) => error!(channel = %name, error = %e, "channel delivery failed"),
                Err(e) => error!(channel = %name, error = %e, "channel task panicked"),
            }
        }

        logged
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, DispatchState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Notifier for NotificationDispatcher {
    async fn notify(&self, alert: &Alert) -> Result<()> {
        NotificationDispatcher::notify(self, alert).await
    }
}
