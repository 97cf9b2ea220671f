//! Webhook channel.
//!
//! POSTs a JSON [`WebhookPayload`] per alert. Non-2xx responses and transport
//! errors are retried up to `retry_count` total attempts, waiting
//! `attempt * retry_delay` after each failed attempt.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use vigil_core::{Result, VigilError};

use super::{
    Channel, ChannelSettings, WEBHOOK, setting_bool, setting_i64, setting_level, setting_string,
};
use crate::config::{
    DEFAULT_WEBHOOK_TIMEOUT_SECS, WebhookConfig, effective_retry_count, positive_secs,
};
use crate::types::{Alert, AlertLevel};

/// Base unit of the linear retry backoff.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// JSON body sent to the webhook endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// RFC 3339 alert time
    pub timestamp: String,
    pub level: String,
    pub level_int: u8,
    pub title: String,
    pub message: String,
    pub source: String,
    pub alert_id: String,
    pub cluster_name: String,
}

impl WebhookPayload {
    pub fn new(alert: &Alert, cluster_name: &str) -> Self {
        Self {
            timestamp: alert.timestamp.to_rfc3339(),
            level: alert.level.as_str().to_string(),
            level_int: alert.level.ordinal(),
            title: alert.title.clone(),
            message: alert.message.clone(),
            source: alert.source.clone(),
            alert_id: alert.id.clone(),
            cluster_name: cluster_name.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct WebhookSettings {
    enabled: bool,
    url: String,
    min_level: AlertLevel,
    headers: BTreeMap<String, String>,
    timeout: Duration,
    attempts: u32,
    cluster_name: String,
    client: reqwest::Client,
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| {
            VigilError::channel_config(WEBHOOK, format!("failed to create HTTP client: {e}"))
        })
}

/// Delivers alerts to an HTTP endpoint.
#[derive(Debug)]
pub struct WebhookChannel {
    settings: RwLock<WebhookSettings>,
    retry_delay: Duration,
}

impl WebhookChannel {
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        let timeout = config.timeout();
        Ok(Self {
            settings: RwLock::new(WebhookSettings {
                enabled: config.enabled,
                url: config.url.clone(),
                min_level: config.min_level,
                headers: config.headers.clone(),
                timeout,
                attempts: config.attempts(),
                cluster_name: config.cluster_name.clone(),
                client: build_client(timeout)?,
            }),
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Override the backoff unit.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn settings(&self) -> WebhookSettings {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn send_once(
        &self,
        settings: &WebhookSettings,
        payload: &WebhookPayload,
    ) -> std::result::Result<(), String> {
        let mut request = settings.client.post(&settings.url).json(payload);
        for (name, value) in &settings.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(format!("HTTP {status}: {body}"))
    }
}

#[async_trait]
impl Channel for WebhookChannel {
    fn name(&self) -> &str {
        WEBHOOK
    }

    fn is_enabled(&self) -> bool {
        let settings = self.settings.read().unwrap_or_else(|e| e.into_inner());
        settings.enabled && !settings.url.is_empty()
    }

    #[instrument(skip(self, alert), fields(alert_id = %alert.id))]
    async fn notify(&self, alert: &Alert) -> Result<()> {
        let settings = self.settings();
        if alert.level < settings.min_level {
            return Ok(());
        }
        if settings.url.is_empty() {
            return Err(VigilError::channel_config(WEBHOOK, "no webhook URL configured"));
        }

        let payload = WebhookPayload::new(alert, &settings.cluster_name);
        let mut last_error = String::new();

        for attempt in 1..=settings.attempts {
            match self.send_once(&settings, &payload).await {
                Ok(()) => {
                    debug!(attempt, "webhook delivered");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = settings.attempts,
                        error = %e,
                        "webhook attempt failed"
                    );
                    last_error = e;
                }
            }
            if attempt < settings.attempts {
                tokio::time::sleep(self.retry_delay * attempt).await;
            }
        }

        Err(VigilError::WebhookDelivery {
            url: settings.url,
            attempts: settings.attempts,
            message: last_error,
        })
    }

    fn configure(&self, settings: &ChannelSettings) -> Result<()> {
        let enabled = setting_bool(WEBHOOK, settings, "enabled")?;
        let url = setting_string(WEBHOOK, settings, "url")?;
        let min_level = setting_level(WEBHOOK, settings, "min_level")?;
        let timeout = setting_i64(WEBHOOK, settings, "timeout_seconds")?
            .map(|secs| positive_secs(secs, DEFAULT_WEBHOOK_TIMEOUT_SECS));
        let attempts = setting_i64(WEBHOOK, settings, "retry_count")?.map(effective_retry_count);
        let cluster_name = setting_string(WEBHOOK, settings, "cluster_name")?;
        let headers = match settings.get("headers") {
            Some(value) => Some(
                serde_json::from_value::<BTreeMap<String, String>>(value.clone()).map_err(|e| {
                    let message = format!("headers must map names to strings: {e}");
                    VigilError::channel_config(WEBHOOK, message)
                })?,
            ),
            None => None,
        };

        let client = match timeout {
            Some(timeout) => Some(build_client(timeout)?),
            None => None,
        };

        let mut current = self.settings.write().unwrap_or_else(|e| e.into_inner());
        if let Some(enabled) = enabled {
            current.enabled = enabled;
        }
        if let Some(url) = url {
            current.url = url;
        }
        if let Some(level) = min_level {
            current.min_level = level;
        }
        if let (Some(timeout), Some(client)) = (timeout, client) {
            current.timeout = timeout;
            current.client = client;
        }
        if let Some(attempts) = attempts {
            current.attempts = attempts;
        }
        if let Some(name) = cluster_name {
            current.cluster_name = name;
        }
        if let Some(headers) = headers {
            current.headers = headers;
        }
        Ok(())
    }
}
