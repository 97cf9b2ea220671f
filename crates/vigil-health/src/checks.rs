//! Built-in health checks.
//!
//! Each check turns one metric into a percentage or count and classifies it
//! with a two-tier [`HealthThreshold`]. Client errors become
//! [`HealthStatus::Unknown`] with the error in the message.

use futures_util::future::BoxFuture;
use std::sync::Arc;

use crate::client::{ClusterClient, JobState};
use crate::engine::HealthEngine;
use crate::types::{HealthCheck, HealthStatus, HealthThreshold};

pub const NODES_CHECK: &str = "nodes";
pub const QUEUE_CHECK: &str = "queue";
pub const UTILIZATION_CHECK: &str = "utilization";

/// Percent of nodes down or draining.
pub const NODES_WARNING_PERCENT: f64 = 10.0;
pub const NODES_CRITICAL_PERCENT: f64 = 25.0;

/// Pending job count.
pub const QUEUE_WARNING_PENDING: f64 = 100.0;
pub const QUEUE_CRITICAL_PENDING: f64 = 500.0;

/// Max of CPU and memory utilization.
pub const UTILIZATION_WARNING_PERCENT: f64 = 90.0;
pub const UTILIZATION_CRITICAL_PERCENT: f64 = 95.0;

/// A registered check: consumes the client, produces a result.
pub type CheckFn =
    Arc<dyn Fn(Arc<dyn ClusterClient>) -> BoxFuture<'static, HealthCheck> + Send + Sync>;

/// Register `nodes`, `queue` and `utilization` with their default thresholds.
pub fn register_defaults(engine: &HealthEngine) {
    let nodes = HealthThreshold::max(NODES_WARNING_PERCENT, NODES_CRITICAL_PERCENT);
    let queue = HealthThreshold::max(QUEUE_WARNING_PENDING, QUEUE_CRITICAL_PENDING);
    let utilization =
        HealthThreshold::max(UTILIZATION_WARNING_PERCENT, UTILIZATION_CRITICAL_PERCENT);

    engine.register_check(NODES_CHECK, move |client| check_nodes(client, nodes));
    engine.register_check(QUEUE_CHECK, move |client| check_queue(client, queue));
    engine.register_check(UTILIZATION_CHECK, move |client| {
        check_utilization(client, utilization)
    });
}

/// Share of unavailable nodes. An empty cluster is Critical.
pub async fn check_nodes(
    client: Arc<dyn ClusterClient>,
    threshold: HealthThreshold,
) -> HealthCheck {
    let check = HealthCheck::new(NODES_CHECK, "Percentage of nodes down or draining", threshold);

    let nodes = match client.list_nodes().await {
        Ok(nodes) => nodes,
        Err(e) => {
            return check.with_status(HealthStatus::Unknown, format!("failed to list nodes: {e}"));
        }
    };
    if nodes.is_empty() {
        return check.with_status(HealthStatus::Critical, "no nodes found");
    }

    let total = nodes.len();
    let unavailable = nodes.iter().filter(|n| n.state.is_unavailable()).count();
    let percent = unavailable as f64 / total as f64 * 100.0;

    check.with_status(
        threshold.evaluate(percent),
        format!("{unavailable} of {total} nodes unavailable ({percent:.1}%)"),
    )
}

/// Number of pending jobs.
pub async fn check_queue(
    client: Arc<dyn ClusterClient>,
    threshold: HealthThreshold,
) -> HealthCheck {
    let check = HealthCheck::new(QUEUE_CHECK, "Jobs waiting in the queue", threshold);

    match client.list_jobs(Some(JobState::Pending)).await {
        Ok(jobs) => check.with_status(
            threshold.evaluate(jobs.len() as f64),
            format!("{} jobs pending", jobs.len()),
        ),
        Err(e) => check.with_status(
            HealthStatus::Unknown,
            format!("failed to list pending jobs: {e}"),
        ),
    }
}

/// Higher of CPU and memory utilization.
pub async fn check_utilization(
    client: Arc<dyn ClusterClient>,
    threshold: HealthThreshold,
) -> HealthCheck {
    let check = HealthCheck::new(
        UTILIZATION_CHECK,
        "Peak of CPU and memory utilization",
        threshold,
    );

    match client.cluster_stats().await {
        Ok(stats) => {
            let peak = stats.cpu_percent.max(stats.memory_percent);
            check.with_status(
                threshold.evaluate(peak),
                format!(
                    "CPU {:.1}%, memory {:.1}%",
                    stats.cpu_percent, stats.memory_percent
                ),
            )
        }
        Err(e) => check.with_status(
            HealthStatus::Unknown,
            format!("cluster stats unavailable: {e}"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClusterStats, Job, Node, NodeState};
    use async_trait::async_trait;
    use vigil_core::{Result, VigilError};

    #[derive(Default)]
    struct FakeClient {
        nodes: Vec<Node>,
        pending: usize,
        stats: Option<ClusterStats>,
    }

    #[async_trait]
    impl ClusterClient for FakeClient {
        async fn list_nodes(&self) -> Result<Vec<Node>> {
            Ok(self.nodes.clone())
        }
        async fn list_jobs(&self, _state: Option<JobState>) -> Result<Vec<Job>> {
            Ok((0..self.pending)
                .map(|i| Job {
                    id: i.to_string(),
                    name: String::new(),
                    user: String::new(),
                    state: JobState::Pending,
                })
                .collect())
        }
        async fn cluster_stats(&self) -> Result<ClusterStats> {
            self.stats
                .clone()
                .ok_or_else(|| VigilError::cluster_query("cluster stats", "offline"))
        }
    }

    fn nodes(up: usize, down: usize) -> Vec<Node> {
        (0..up)
            .map(|i| Node {
                name: format!("up{i}"),
                state: NodeState::Allocated,
            })
            .chain((0..down).map(|i| Node {
                name: format!("down{i}"),
                state: NodeState::Down,
            }))
            .collect()
    }

    fn default_nodes() -> HealthThreshold {
        HealthThreshold::max(NODES_WARNING_PERCENT, NODES_CRITICAL_PERCENT)
    }

    #[tokio::test]
    async fn test_nodes_check() {
        let client = Arc::new(FakeClient {
            nodes: nodes(95, 5),
            ..Default::default()
        });
        let check = check_nodes(client, default_nodes()).await;
        assert_eq!(check.status, HealthStatus::Healthy);
        assert_eq!(check.message, "5 of 100 nodes unavailable (5.0%)");

        let client = Arc::new(FakeClient {
            nodes: nodes(7, 3),
            ..Default::default()
        });
        assert_eq!(check_nodes(client, default_nodes()).await.status, HealthStatus::Critical);
    }

    #[tokio::test]
    async fn test_no_nodes_is_critical() {
        let check = check_nodes(Arc::new(FakeClient::default()), default_nodes()).await;
        assert_eq!(check.status, HealthStatus::Critical);
        assert_eq!(check.message, "no nodes found");
    }

    #[tokio::test]
    async fn test_queue_check() {
        let threshold = HealthThreshold::max(QUEUE_WARNING_PENDING, QUEUE_CRITICAL_PENDING);
        let client = Arc::new(FakeClient {
            pending: 150,
            ..Default::default()
        });
        let check = check_queue(client, threshold).await;
        assert_eq!(check.status, HealthStatus::Warning);
        assert_eq!(check.message, "150 jobs pending");
    }

    #[tokio::test]
    async fn test_utilization_uses_peak_and_unknown_without_stats() {
        let threshold =
            HealthThreshold::max(UTILIZATION_WARNING_PERCENT, UTILIZATION_CRITICAL_PERCENT);
        let client = Arc::new(FakeClient {
            stats: Some(ClusterStats {
                cpu_percent: 40.0,
                memory_percent: 96.5,
                ..Default::default()
            }),
            ..Default::default()
        });
        assert_eq!(check_utilization(client, threshold).await.status, HealthStatus::Critical);

        let check = check_utilization(Arc::new(FakeClient::default()), threshold).await;
        assert_eq!(check.status, HealthStatus::Unknown);
        assert!(check.message.contains("offline"));
    }
}
