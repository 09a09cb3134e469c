//! The control-plane interface consumed by the sequencer.

use std::time::Duration;

use async_trait::async_trait;

use capstan_core::{ImageArtifact, LabelSelector, Workload};

use crate::error::ClusterResult;

/// Result of waiting for a workload rollout to converge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloutStatus {
    /// All replicas replaced and healthy.
    Healthy,
    /// The platform reported a failure condition, or the wait ceiling
    /// was hit.
    Failed(String),
}

/// Exit of a one-shot ephemeral task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskExit {
    /// The task ran to completion with this exit code.
    Exited(i32),
    /// The task never reached a running state within the start timeout.
    NeverStarted(String),
}

/// Operations the sequencer needs from the orchestration platform.
///
/// Every mutation asserts a desired state; re-issuing the same call
/// against an already-converged cluster is a no-op on the platform side.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Set the desired image on a workload's containers.
    async fn set_image(
        &self,
        workload: &Workload,
        artifact: &ImageArtifact,
    ) -> ClusterResult<()>;

    /// Block until the workload's rollout completes or fails.
    ///
    /// `ceiling` bounds the wait client-side; `None` delegates to the
    /// platform's own timeout semantics.
    async fn wait_rollout(
        &self,
        workload: &Workload,
        ceiling: Option<Duration>,
    ) -> ClusterResult<RolloutStatus>;

    /// Run a short-lived one-shot task from `artifact` and wait for it
    /// to exit. The task's environment is populated from `env_secret`
    /// when given; the bundle is passed through opaquely.
    async fn run_probe_task(
        &self,
        namespace: &str,
        artifact: &ImageArtifact,
        command: &[String],
        env_secret: Option<&str>,
        start_timeout: Duration,
    ) -> ClusterResult<TaskExit>;

    /// Start a long-lived task from `artifact` that an operator can
    /// attach to. Returns the task name. Fire-and-forget: the task is
    /// not waited on.
    async fn spawn_diagnostic_task(
        &self,
        namespace: &str,
        artifact: &ImageArtifact,
        env_secret: Option<&str>,
    ) -> ClusterResult<String>;

    /// Long-running services matching a label selector, in the
    /// inventory's returned order.
    async fn list_services(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> ClusterResult<Vec<Workload>>;

    /// Scheduled-job templates matching a label selector.
    async fn list_scheduled(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> ClusterResult<Vec<Workload>>;

    /// Rewrite a scheduled template's stored image. Future invocations
    /// use the new image; no run is triggered.
    async fn update_scheduled_image(
        &self,
        workload: &Workload,
        artifact: &ImageArtifact,
    ) -> ClusterResult<()>;
}
