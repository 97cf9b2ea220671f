//! Cluster health evaluation for Vigil.
//!
//! [`HealthEngine`] runs named checks against a [`ClusterClient`] on a fixed
//! interval and feeds Warning/Critical results into the alert store.

pub mod checks;
pub mod client;
pub mod engine;
pub mod types;

pub use client::{
    ClusterClient, ClusterSnapshot, ClusterStats, Job, JobState, Node, NodeState, SnapshotClient,
};
pub use engine::{HealthEngine, HealthEngineConfig};
pub use types::{ClusterHealth, HealthCheck, HealthIssue, HealthStatus, HealthThreshold};
pub use vigil_core::{Result, VigilError};
