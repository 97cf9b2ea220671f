//! Integration tests for the health engine feeding the alert pipeline.
//!
//! These tests verify that:
//! 1. A failing check produces exactly one alert with the expected shape
//! 2. Threshold classification carries through to the overall status
//! 3. Alerts raised by the engine reach the alert log via the dispatcher

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use vigil_alerts::{
    AlertLevel, AlertLogEntry, AlertStore, NotificationConfig, NotificationDispatcher,
};
use vigil_core::{Result, VigilError};
use vigil_health::checks::{check_nodes, register_defaults};
use vigil_health::{
    ClusterClient, ClusterStats, HealthCheck, HealthEngine, HealthEngineConfig, HealthStatus,
    HealthThreshold, Job, JobState, Node, NodeState, SnapshotClient,
};

/// Client reporting a fixed number of down nodes out of 100, or failing.
struct NodesClient {
    down: Option<usize>,
}

#[async_trait]
impl ClusterClient for NodesClient {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let down = self
            .down
            .ok_or_else(|| VigilError::cluster_query("list nodes", "scheduler unreachable"))?;
        Ok((0..100)
            .map(|i| Node {
                name: format!("node{i:03}"),
                state: if i < down { NodeState::Down } else { NodeState::Idle },
            })
            .collect())
    }

    async fn list_jobs(&self, _state: Option<JobState>) -> Result<Vec<Job>> {
        Ok(Vec::new())
    }

    async fn cluster_stats(&self) -> Result<ClusterStats> {
        Ok(ClusterStats::default())
    }
}

fn engine_with(client: Arc<dyn ClusterClient>) -> (HealthEngine, Arc<AlertStore>) {
    let store = Arc::new(AlertStore::default());
    let engine = HealthEngine::new(client, Arc::clone(&store), HealthEngineConfig::default());
    (engine, store)
}

#[tokio::test]
async fn test_critical_check_raises_one_alert() {
    let (engine, store) = engine_with(Arc::new(NodesClient { down: Some(0) }));
    engine.register_check("controller", |_client: Arc<dyn ClusterClient>| async move {
        HealthCheck::new("controller", "Scheduler controller", HealthThreshold::default())
            .with_status(HealthStatus::Critical, "cluster down")
    });

    engine.run_cycle().await;

    let alerts = store.get_alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].level, AlertLevel::Critical);
    assert_eq!(alerts[0].source, "controller");
    assert_eq!(alerts[0].title, "Health Check Alert: controller");
    assert_eq!(alerts[0].message, "cluster down");
    assert!(alerts[0].id.starts_with("controller-"));
    assert_eq!(engine.get_health().overall_status, HealthStatus::Critical);
}

#[tokio::test]
async fn test_node_threshold_classification() {
    let cases = [
        (Some(30), HealthStatus::Critical),
        (Some(15), HealthStatus::Warning),
        (Some(5), HealthStatus::Healthy),
        (None, HealthStatus::Unknown),
    ];

    for (down, expected) in cases {
        let (engine, store) = engine_with(Arc::new(NodesClient { down }));
        engine.register_check("nodes", |client| {
            check_nodes(client, HealthThreshold::max(10.0, 25.0))
        });

        let health = engine.run_cycle().await;
        assert_eq!(health.checks["nodes"].status, expected, "down = {down:?}");
        assert_eq!(health.overall_status, expected, "down = {down:?}");

        let expected_alerts = usize::from(matches!(
            expected,
            HealthStatus::Warning | HealthStatus::Critical
        ));
        assert_eq!(store.len(), expected_alerts, "down = {down:?}");
    }
}

#[tokio::test]
async fn test_engine_alerts_reach_alert_log() {
    vigil_core::logging::init_test_logging();
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("logs").join("alerts.log");

    let mut config = NotificationConfig::default();
    config.terminal_bell.enabled = false;
    config.log_file.path = log_path.clone();
    let dispatcher = Arc::new(NotificationDispatcher::with_config(
        dir.path().join("notifications.json"),
        config,
    ));

    let (engine, store) = engine_with(Arc::new(NodesClient { down: Some(15) }));
    store.set_notifier(dispatcher);
    engine.register_check("nodes", |client| {
        check_nodes(client, HealthThreshold::max(10.0, 25.0))
    });

    engine.run_cycle().await;

    let entries = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(contents) = tokio::fs::read_to_string(&log_path).await {
                if !contents.is_empty() {
                    return contents;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("alert never reached the log");

    let entry: AlertLogEntry = serde_json::from_str(entries.lines().next().unwrap()).unwrap();
    assert_eq!(entry.level, "warning");
    assert_eq!(entry.source, "nodes");
    assert_eq!(entry.title, "Health Check Alert: nodes");
    assert_eq!(entry.id, store.get_alerts()[0].id);
}

#[tokio::test]
async fn test_default_checks_against_snapshot() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cluster.json");
    std::fs::write(
        &path,
        serde_json::json!({
            "nodes": [
                {"name": "n1", "state": "idle"},
                {"name": "n2", "state": "allocated"},
                {"name": "n3", "state": "mixed"},
                {"name": "n4", "state": "down"}
            ],
            "jobs": [{"id": "1", "state": "pending"}, {"id": "2", "state": "running"}],
            "stats": {"cpu_percent": 91.0, "memory_percent": 40.0}
        })
        .to_string(),
    )
    .unwrap();

    let (engine, store) = engine_with(Arc::new(SnapshotClient::new(&path)));
    register_defaults(&engine);
    assert_eq!(engine.check_names(), vec!["nodes", "queue", "utilization"]);

    let health = engine.run_cycle().await;
    assert_eq!(health.checks["nodes"].status, HealthStatus::Critical);
    assert_eq!(health.checks["queue"].status, HealthStatus::Healthy);
    assert_eq!(health.checks["utilization"].status, HealthStatus::Warning);
    assert_eq!(health.overall_status, HealthStatus::Critical);
    assert_eq!(health.issues.len(), 2);

    let mut levels: Vec<AlertLevel> = store.get_alerts().iter().map(|a| a.level).collect();
    levels.sort();
    assert_eq!(levels, vec![AlertLevel::Warning, AlertLevel::Critical]);
}
