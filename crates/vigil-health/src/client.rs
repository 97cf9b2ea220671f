//! Cluster query boundary.
//!
//! Health checks see the cluster only through [`ClusterClient`]. The real
//! scheduler client lives outside this crate; [`SnapshotClient`] answers from
//! an exported JSON snapshot.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use vigil_core::{Result, VigilError};

/// Scheduler state of a compute node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Idle,
    Allocated,
    Mixed,
    Down,
    Drain,
    Drained,
    Draining,
    #[serde(other)]
    Unknown,
}

impl NodeState {
    /// Down or draining nodes cannot take work.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            NodeState::Down | NodeState::Drain | NodeState::Drained | NodeState::Draining
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub state: NodeState,
}

/// Scheduler state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user: String,
    pub state: JobState,
}

/// Aggregate cluster utilization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterStats {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub running_jobs: u64,
    pub pending_jobs: u64,
    pub total_nodes: u64,
    pub idle_nodes: u64,
    pub down_nodes: u64,
}

/// Read-only cluster queries used by health checks.
///
/// Any error is reported as an Unknown check status.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// Jobs, optionally filtered by state.
    async fn list_jobs(&self, state: Option<JobState>) -> Result<Vec<Job>>;

    async fn cluster_stats(&self) -> Result<ClusterStats>;
}

/// Exported cluster state as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSnapshot {
    pub nodes: Vec<Node>,
    pub jobs: Vec<Job>,
    /// Missing stats make `cluster_stats` fail
    pub stats: Option<ClusterStats>,
}

/// Answers queries from a JSON snapshot file, re-read on every call.
#[derive(Debug, Clone)]
pub struct SnapshotClient {
    path: PathBuf,
}

impl SnapshotClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self, query: &str) -> Result<ClusterSnapshot> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| {
                VigilError::cluster_query(query, format!("{}: {e}", self.path.display()))
            })?;
        serde_json::from_str(&contents)
            .map_err(|e| VigilError::cluster_query(query, format!("invalid snapshot: {e}")))
    }
}

#[async_trait]
impl ClusterClient for SnapshotClient {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        Ok(self.load("list nodes").await?.nodes)
    }

    async fn list_jobs(&self, state: Option<JobState>) -> Result<Vec<Job>> {
        let jobs = self.load("list jobs").await?.jobs;
        Ok(match state {
            Some(state) => jobs.into_iter().filter(|j| j.state == state).collect(),
            None => jobs,
        })
    }

    async fn cluster_stats(&self) -> Result<ClusterStats> {
        self.load("cluster stats")
            .await?
            .stats
            .ok_or_else(|| VigilError::cluster_query("cluster stats", "snapshot has no stats"))
    }
}
