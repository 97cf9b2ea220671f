//! Health model: per-check results, thresholds, and the cluster snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use vigil_alerts::AlertLevel;

/// Outcome of a health check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Healthy,
    Warning,
    Critical,
    /// The check could not obtain its data
    Unknown,
}

impl HealthStatus {
    /// Aggregation rank: Healthy < Unknown < Warning < Critical.
    pub fn severity(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 0,
            HealthStatus::Unknown => 1,
            HealthStatus::Warning => 2,
            HealthStatus::Critical => 3,
        }
    }

    /// The more severe of two statuses.
    pub fn worst(self, other: HealthStatus) -> HealthStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    /// Alert level raised for this status, if any.
    pub fn alert_level(&self) -> Option<AlertLevel> {
        match self {
            HealthStatus::Warning => Some(AlertLevel::Warning),
            HealthStatus::Critical => Some(AlertLevel::Critical),
            HealthStatus::Healthy | HealthStatus::Unknown => None,
        }
    }

    pub fn is_problem(&self) -> bool {
        self.alert_level().is_some()
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Warning => write!(f, "warning"),
            HealthStatus::Critical => write!(f, "critical"),
            HealthStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Two-tier numeric bounds. Absent bounds never trigger.
///
/// Critical bounds are evaluated first. Max bounds trigger at `value >= max`,
/// min bounds at `value <= min`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthThreshold {
    pub warning_min: Option<f64>,
    pub warning_max: Option<f64>,
    pub critical_min: Option<f64>,
    pub critical_max: Option<f64>,
}

impl HealthThreshold {
    /// Upper-bound-only threshold.
    pub fn max(warning: f64, critical: f64) -> Self {
        Self {
            warning_max: Some(warning),
            critical_max: Some(critical),
            ..Default::default()
        }
    }

    /// Classify `value` against the bounds.
    pub fn evaluate(&self, value: f64) -> HealthStatus {
        if breaches(value, self.critical_min, self.critical_max) {
            HealthStatus::Critical
        } else if breaches(value, self.warning_min, self.warning_max) {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        }
    }
}

fn breaches(value: f64, min: Option<f64>, max: Option<f64>) -> bool {
    min.is_some_and(|min| value <= min) || max.is_some_and(|max| value >= max)
}

/// Latest result of one named check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Unique key
    pub name: String,
    pub description: String,
    pub status: HealthStatus,
    /// Human-readable explanation of `status`
    pub message: String,
    pub last_check: DateTime<Utc>,
    /// Number of completed evaluations
    pub check_count: u64,
    pub threshold: HealthThreshold,
}

impl HealthCheck {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        threshold: HealthThreshold,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            status: HealthStatus::Unknown,
            message: String::new(),
            last_check: Utc::now(),
            check_count: 0,
            threshold,
        }
    }

    pub fn with_status(mut self, status: HealthStatus, message: impl Into<String>) -> Self {
        self.status = status;
        self.message = message.into();
        self
    }
}

/// A problem that persists across cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthIssue {
    pub id: String,
    /// Check that raised the issue
    pub component: String,
    pub severity: HealthStatus,
    pub title: String,
    pub description: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub occurrences: u64,
    pub resolved: bool,
}

impl HealthIssue {
    /// Open an issue from a failing check.
    pub fn open(check: &HealthCheck) -> Self {
        Self {
            id: format!("{}-{}", check.name, check.last_check.timestamp()),
            component: check.name.clone(),
            severity: check.status,
            title: format!("{} is {}", check.name, check.status),
            description: check.message.clone(),
            first_seen: check.last_check,
            last_seen: check.last_check,
            occurrences: 1,
            resolved: false,
        }
    }

    /// Record another failing result for the same check.
    pub fn refresh(&mut self, check: &HealthCheck) {
        self.severity = check.status;
        self.title = format!("{} is {}", check.name, check.status);
        self.description = check.message.clone();
        self.last_seen = check.last_check;
        self.occurrences += 1;
    }
}

/// Point-in-time view of the whole cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterHealth {
    pub overall_status: HealthStatus,
    pub checks: BTreeMap<String, HealthCheck>,
    /// Currently open issues
    pub issues: Vec<HealthIssue>,
    pub last_updated: DateTime<Utc>,
}

impl Default for ClusterHealth {
    fn default() -> Self {
        Self {
            overall_status: HealthStatus::Healthy,
            checks: BTreeMap::new(),
            issues: Vec::new(),
            last_updated: Utc::now(),
        }
    }
}

impl ClusterHealth {
    /// Worst status across `checks`, Healthy when empty.
    pub fn overall<'a>(checks: impl IntoIterator<Item = &'a HealthCheck>) -> HealthStatus {
        checks
            .into_iter()
            .fold(HealthStatus::Healthy, |acc, check| acc.worst(check.status))
    }
}
