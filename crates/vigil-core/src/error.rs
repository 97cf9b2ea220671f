//! Error types for Vigil operations.
//!
//! This module defines [`VigilError`], the error enum shared by the alerting and
//! health crates. Only the lowest layers (channels, the alert logger, config
//! persistence, cluster queries) produce these errors; the store, dispatcher and
//! health engine catch them one level up and surface them through logging.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`VigilError`].
pub type Result<T> = std::result::Result<T, VigilError>;

/// Error type for all Vigil operations.
#[derive(Debug, Error)]
pub enum VigilError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file could not be parsed
    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    /// Configuration value rejected
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    /// Configuration could not be written
    #[error("Failed to persist configuration to {path}")]
    ConfigPersist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error with context
    #[error("I/O error {operation}: {path}")]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory creation failed
    #[error("Failed to create directory: {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Parsing Errors
    // =========================================================================
    /// JSON encode/decode error
    #[error("JSON error in {context}: {message}")]
    Json {
        context: String,
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // =========================================================================
    // Cluster Errors
    // =========================================================================
    /// The cluster query client failed to answer
    #[error("Cluster query failed ({query}): {message}")]
    ClusterQuery { query: String, message: String },

    // =========================================================================
    // Delivery Errors
    // =========================================================================
    /// Channel cannot deliver on this host
    #[error("Channel {channel} unavailable: {reason}")]
    ChannelUnavailable { channel: String, reason: String },

    /// Channel attempted delivery and failed
    #[error("Channel {channel} delivery failed: {message}")]
    ChannelDelivery { channel: String, message: String },

    /// Channel rejected a settings update
    #[error("Invalid settings for channel {channel}: {message}")]
    ChannelConfig { channel: String, message: String },

    /// Webhook delivery failed after exhausting all attempts
    #[error("Webhook {url} failed after {attempts} attempt(s): {message}")]
    WebhookDelivery {
        url: String,
        attempts: u32,
        message: String,
    },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (bug in Vigil)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl VigilError {
    /// Create an I/O error
    pub fn io(
        operation: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Create a JSON error
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a cluster query error
    pub fn cluster_query(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ClusterQuery {
            query: query.into(),
            message: message.into(),
        }
    }

    /// Create a channel delivery error
    pub fn delivery(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ChannelDelivery {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Create a channel unavailable error
    pub fn unavailable(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ChannelUnavailable {
            channel: channel.into(),
            reason: reason.into(),
        }
    }

    /// Create a channel settings error
    pub fn channel_config(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ChannelConfig {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    // =========================================================================
    // Error classification helpers
    // =========================================================================

    /// Returns true if retrying the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ChannelDelivery { .. } | Self::WebhookDelivery { .. } | Self::ClusterQuery { .. }
        )
    }

    /// Returns true if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigInvalid { .. }
                | Self::ConfigValidation { .. }
                | Self::ConfigPersist { .. }
                | Self::ChannelConfig { .. }
        )
    }

    /// Returns true if this error came from an alert delivery channel
    pub fn is_delivery_error(&self) -> bool {
        matches!(
            self,
            Self::ChannelUnavailable { .. }
                | Self::ChannelDelivery { .. }
                | Self::WebhookDelivery { .. }
        )
    }

    /// Returns actionable guidance for the operator
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            Self::ConfigInvalid { .. } => {
                Some("Fix the JSON syntax or delete the file to fall back to defaults")
            }
            Self::ConfigPersist { .. } => {
                Some("Settings are active for this session but were not saved; check permissions")
            }
            Self::ChannelUnavailable { .. } => {
                Some("Install a desktop notification helper (notify-send) or disable the channel")
            }
            Self::WebhookDelivery { .. } => {
                Some("Check the webhook URL and that the receiving service is reachable")
            }
            Self::DirectoryCreation { .. } | Self::Io { .. } => {
                Some("Check that the alert log directory is writable")
            }
            _ => None,
        }
    }
}

impl From<serde_json::Error> for VigilError {
    fn from(source: serde_json::Error) -> Self {
        Self::json("serialization", source)
    }
}
