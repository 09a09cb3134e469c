//! Sequencer error types.
//!
//! Per-workload rollout failures are not errors — they are recorded as
//! outcomes in the report. These errors cover failures before the loop
//! starts: plan resolution and configuration.

use thiserror::Error;

/// Errors that can occur setting up a run.
#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("rollout plan is empty")]
    EmptyPlan,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cluster error: {0}")]
    Cluster(#[from] capstan_cluster::ClusterError),
}

pub type SequencerResult<T> = Result<T, SequencerError>;
