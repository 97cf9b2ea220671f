//! Alert domain types.
//!
//! ## Levels
//!
//! - **Critical**: cluster is failing (nodes down, no nodes at all)
//! - **Error**: a subsystem failed and needs attention
//! - **Warning**: degraded (queue backing up, utilization high)
//! - **Info**: informational, test notifications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use vigil_core::VigilError;

/// Alert severity level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// Informational
    #[default]
    Info = 0,
    /// Attention recommended
    Warning = 1,
    /// Something failed
    Error = 2,
    /// Immediate action required
    Critical = 3,
}

impl AlertLevel {
    /// All levels, lowest first.
    pub const ALL: [AlertLevel; 4] = [
        AlertLevel::Info,
        AlertLevel::Warning,
        AlertLevel::Error,
        AlertLevel::Critical,
    ];

    /// Wire name, as used in config files, the alert log and webhook payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Error => "error",
            AlertLevel::Critical => "critical",
        }
    }

    /// Numeric ordinal (0 = info .. 3 = critical).
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    /// Get the icon for this level.
    pub fn icon(&self) -> &'static str {
        match self {
            AlertLevel::Info => "ℹ",
            AlertLevel::Warning => "⚠",
            AlertLevel::Error => "✗",
            AlertLevel::Critical => "✖",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertLevel::Info => write!(f, "INFO"),
            AlertLevel::Warning => write!(f, "WARNING"),
            AlertLevel::Error => write!(f, "ERROR"),
            AlertLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl FromStr for AlertLevel {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(AlertLevel::Info),
            "warn" | "warning" => Ok(AlertLevel::Warning),
            "error" => Ok(AlertLevel::Error),
            "critical" | "crit" => Ok(AlertLevel::Critical),
            other => Err(VigilError::ConfigValidation {
                message: format!("unknown alert level '{other}'"),
            }),
        }
    }
}

/// A single alert.
///
/// `id` and `timestamp` are filled in by the alert store on insertion; callers
/// may leave `id` empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    /// Unique identifier, `<source>-<nanosecond timestamp>` when generated
    pub id: String,
    /// Severity level
    pub level: AlertLevel,
    /// Short title
    pub title: String,
    /// Detailed message
    pub message: String,
    /// Subsystem that raised the alert
    pub source: String,
    /// Insertion time
    pub timestamp: DateTime<Utc>,
    /// Whether the operator has seen it
    pub acknowledged: bool,
    /// Remove automatically after `dismiss_after`
    pub auto_dismiss: bool,
    /// Delay before automatic removal
    pub dismiss_after: Duration,
}

impl Alert {
    /// Create a new unacknowledged alert.
    pub fn new(
        level: AlertLevel,
        title: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            level,
            title: title.into(),
            message: message.into(),
            source: source.into(),
            timestamp: Utc::now(),
            acknowledged: false,
            auto_dismiss: false,
            dismiss_after: Duration::ZERO,
        }
    }

    /// Use an explicit id instead of a generated one.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Remove the alert automatically once `after` has elapsed.
    pub fn with_auto_dismiss(mut self, after: Duration) -> Self {
        self.auto_dismiss = true;
        self.dismiss_after = after;
        self
    }

    /// Mark the alert as already acknowledged.
    pub fn acknowledged(mut self) -> Self {
        self.acknowledged = true;
        self
    }

    /// Build the default id for an alert from `source` raised at `at`.
    pub fn generate_id(source: &str, at: DateTime<Utc>) -> String {
        let nanos = at
            .timestamp_nanos_opt()
            .unwrap_or_else(|| at.timestamp_micros().saturating_mul(1_000));
        format!("{source}-{nanos}")
    }

    /// Format for display in one line.
    pub fn format_compact(&self) -> String {
        let ack_marker = if self.acknowledged { "✓" } else { " " };
        format!(
            "{} {} [{}] {}",
            ack_marker,
            self.level.icon(),
            self.source,
            self.title
        )
    }

    /// Format for detailed display.
    pub fn format_detail(&self) -> String {
        format!(
            "[{}] {} {} - {}\n  {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.source,
            self.title,
            self.message
        )
    }
}

/// Unread-count summary for the header badge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertBadge {
    /// Unacknowledged critical alerts
    pub critical: usize,
    /// Unacknowledged error alerts
    pub error: usize,
    /// Unacknowledged warning alerts
    pub warning: usize,
    /// Unacknowledged info alerts
    pub info: usize,
    /// Total unacknowledged
    pub total: usize,
}

impl AlertBadge {
    /// Count one unacknowledged alert.
    pub fn add(&mut self, level: AlertLevel) {
        match level {
            AlertLevel::Critical => self.critical += 1,
            AlertLevel::Error => self.error += 1,
            AlertLevel::Warning => self.warning += 1,
            AlertLevel::Info => self.info += 1,
        }
        self.total += 1;
    }

    /// Check if badge should be displayed.
    pub fn should_display(&self) -> bool {
        self.total > 0
    }

    /// Format for display in header.
    pub fn format_header(&self) -> String {
        if self.critical > 0 || self.error > 0 {
            format!(
                "⚠ {} critical | {} error | {} warning",
                self.critical, self.error, self.warning
            )
        } else if self.warning > 0 {
            format!("⚠ {} warning", self.warning)
        } else if self.total > 0 {
            format!("ℹ {}", self.total)
        } else {
            String::new()
        }
    }
}
