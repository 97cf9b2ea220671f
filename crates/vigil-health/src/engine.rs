//! Periodic health evaluation.
//!
//! The engine owns a set of named checks. Each cycle runs all of them
//! concurrently against the [`ClusterClient`], builds a fresh [`ClusterHealth`]
//! snapshot, swaps it in whole, and raises an alert for every Warning or
//! Critical result.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use vigil_alerts::AlertStore;
//! use vigil_health::{HealthEngine, HealthEngineConfig, SnapshotClient, checks};
//!
//! # async fn run() {
//! let store = Arc::new(AlertStore::default());
//! let client = Arc::new(SnapshotClient::new("cluster.json"));
//! let engine = Arc::new(HealthEngine::new(client, store, HealthEngineConfig::default()));
//! checks::register_defaults(&engine);
//!
//! engine.start();
//! // ...
//! engine.stop().await;
//! # }
//! ```

use chrono::Utc;
use futures_util::future::{BoxFuture, join_all};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use vigil_alerts::{Alert, AlertStore};

use crate::checks::CheckFn;
use crate::client::ClusterClient;
use crate::types::{ClusterHealth, HealthCheck, HealthIssue, HealthStatus, HealthThreshold};

/// Default evaluation interval in seconds.
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 30;

/// Engine settings.
#[derive(Debug, Clone)]
pub struct HealthEngineConfig {
    /// Time between evaluation cycles
    pub check_interval: Duration,
}

impl Default for HealthEngineConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
        }
    }
}

impl HealthEngineConfig {
    pub fn with_interval(check_interval: Duration) -> Self {
        Self { check_interval }
    }

    fn interval(&self) -> Duration {
        if self.check_interval.is_zero() {
            Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS)
        } else {
            self.check_interval
        }
    }
}

/// Alert title raised for a failing check.
pub fn alert_title(check_name: &str) -> String {
    format!("Health Check Alert: {check_name}")
}

/// Runs registered checks on a fixed interval.
pub struct HealthEngine {
    client: Arc<dyn ClusterClient>,
    store: Arc<AlertStore>,
    config: HealthEngineConfig,
    checks: RwLock<BTreeMap<String, CheckFn>>,
    health: RwLock<ClusterHealth>,
    running: AtomicBool,
    stop_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
    // Cycles never overlap.
    cycle_lock: tokio::sync::Mutex<()>,
}

impl HealthEngine {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        store: Arc<AlertStore>,
        config: HealthEngineConfig,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            client,
            store,
            config,
            checks: RwLock::new(BTreeMap::new()),
            health: RwLock::new(ClusterHealth::default()),
            running: AtomicBool::new(false),
            stop_tx,
            task: Mutex::new(None),
            cycle_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Add or replace the check called `name`.
    pub fn register_check<F, Fut>(&self, name: impl Into<String>, check: F)
    where
        F: Fn(Arc<dyn ClusterClient>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HealthCheck> + Send + 'static,
    {
        let name = name.into();
        let check: CheckFn = Arc::new(
            move |client: Arc<dyn ClusterClient>| -> BoxFuture<'static, HealthCheck> {
                Box::pin(check(client))
            },
        );
        if self.write_checks().insert(name.clone(), check).is_some() {
            debug!(check = %name, "replaced health check");
        } else {
            debug!(check = %name, "registered health check");
        }
    }

    /// Remove a check. Its result disappears from the next snapshot.
    pub fn unregister_check(&self, name: &str) -> bool {
        self.write_checks().remove(name).is_some()
    }

    /// Registered check names, sorted.
    pub fn check_names(&self) -> Vec<String> {
        self.checks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Copy of the latest snapshot.
    pub fn get_health(&self) -> ClusterHealth {
        self.health
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the periodic loop. The first cycle runs immediately.
    ///
    /// Must be called from within a Tokio runtime. Calling it while already
    /// running does nothing.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("health engine already running");
            return;
        }
        self.stop_tx.send_replace(false);
        let mut stop_rx = self.stop_tx.subscribe();
        let engine = Arc::clone(self);
        let interval = self.config.interval();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = interval.as_secs_f64(), "health engine started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop_rx.changed() => break,
                }
                if !engine.running.load(Ordering::SeqCst) {
                    break;
                }
                // Not raced against the stop signal: a started cycle always finishes.
                engine.run_cycle().await;
            }
            info!("health engine stopped");
        });

        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Stop the loop, waiting for an in-flight cycle to finish.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.stop_tx.send_replace(true);

        let handle = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "health engine task ended abnormally");
            }
        }
    }

    /// Run every check once, publish the snapshot, and raise alerts.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> ClusterHealth {
        let _cycle = self.cycle_lock.lock().await;

        let checks: Vec<(String, CheckFn)> = self
            .checks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(name, check)| (name.clone(), Arc::clone(check)))
            .collect();
        let previous = self.get_health();

        let tasks = checks.into_iter().map(|(name, check)| {
            let handle = tokio::spawn(check(Arc::clone(&self.client)));
            async move { (name, handle.await) }
        });
        let outcomes = join_all(tasks).await;

        let now = Utc::now();
        let mut results = BTreeMap::new();
        for (name, outcome) in outcomes {
            let mut check = match outcome {
                Ok(check) => check,
                Err(e) => {
                    warn!(check = %name, error = %e, "health check task failed");
                    let (description, threshold) = previous
                        .checks
                        .get(&name)
                        .map(|c| (c.description.clone(), c.threshold))
                        .unwrap_or_else(|| (String::new(), HealthThreshold::default()));
                    HealthCheck::new(&name, description, threshold)
                        .with_status(HealthStatus::Unknown, format!("check failed: {e}"))
                }
            };
            check.name = name.clone();
            check.last_check = now;
            check.check_count = previous.checks.get(&name).map_or(0, |c| c.check_count) + 1;
            debug!(
                check = %name,
                status = %check.status,
                message = %check.message,
                "health check complete"
            );
            results.insert(name, check);
        }

        let snapshot = ClusterHealth {
            overall_status: ClusterHealth::overall(results.values()),
            issues: track_issues(&previous.issues, &results),
            checks: results,
            last_updated: now,
        };
        *self.health.write().unwrap_or_else(|e| e.into_inner()) = snapshot.clone();

        for check in snapshot.checks.values() {
            if let Some(level) = check.status.alert_level() {
                self.store.add_alert(Alert::new(
                    level,
                    alert_title(&check.name),
                    check.message.clone(),
                    check.name.clone(),
                ));
            }
        }

        info!(
            overall = %snapshot.overall_status,
            checks = snapshot.checks.len(),
            issues = snapshot.issues.len(),
            "health cycle complete"
        );
        snapshot
    }

    fn write_checks(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, CheckFn>> {
        self.checks.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Carry open issues into the next snapshot.
///
/// Warning/Critical opens or refreshes the issue for that check, Healthy
/// resolves it, Unknown leaves it as is. Issues of removed checks are dropped.
fn track_issues(open: &[HealthIssue], checks: &BTreeMap<String, HealthCheck>) -> Vec<HealthIssue> {
    let mut issues: BTreeMap<String, HealthIssue> = open
        .iter()
        .filter(|issue| checks.contains_key(&issue.component))
        .map(|issue| (issue.component.clone(), issue.clone()))
        .collect();

    for (name, check) in checks {
        match check.status {
            HealthStatus::Warning | HealthStatus::Critical => match issues.get_mut(name) {
                Some(issue) => issue.refresh(check),
                None => {
                    issues.insert(name.clone(), HealthIssue::open(check));
                }
            },
            HealthStatus::Healthy => {
                if let Some(mut issue) = issues.remove(name) {
                    issue.resolved = true;
                    info!(
                        issue = %issue.id,
                        occurrences = issue.occurrences,
                        "health issue resolved"
                    );
                }
            }
            HealthStatus::Unknown => {}
        }
    }

    issues.into_values().collect()
}
