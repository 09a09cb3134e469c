//! Pre-flight gate.
//!
//! Before any workload is mutated, a one-shot probe task built from the
//! new image runs the static-asset collection step and the
//! pending-migration check. Fail-closed: schema-incompatible code is
//! never rolled forward. On a failing gate a long-lived diagnostic task
//! is left behind so the operator can attach and inspect the image.

use std::time::Duration;

use tracing::{error, info, warn};

use capstan_cluster::{ControlPlane, TaskExit};
use capstan_core::{CapstanConfig, ImageArtifact};

use crate::report::PreflightOutcome;

const GATE_FAILURE: &str = "unapplied migrations or asset collection failure";

/// The configured gate: probe command, start timeout, env bundle.
#[derive(Debug, Clone)]
pub struct PreflightCheck {
    pub namespace: String,
    pub command: Vec<String>,
    pub start_timeout: Duration,
    pub env_secret: Option<String>,
}

impl PreflightCheck {
    pub fn from_config(config: &CapstanConfig) -> Self {
        Self {
            namespace: config.plan.namespace.clone(),
            command: config.preflight.command.clone(),
            start_timeout: config.probe_start_timeout(),
            env_secret: config.env_secret().map(str::to_string),
        }
    }

    /// Run the gate. Exit 0 passes; anything else fails the run before
    /// any workload is touched.
    pub async fn run(
        &self,
        control: &dyn ControlPlane,
        artifact: &ImageArtifact,
    ) -> PreflightOutcome {
        let exit = control
            .run_probe_task(
                &self.namespace,
                artifact,
                &self.command,
                self.env_secret.as_deref(),
                self.start_timeout,
            )
            .await;

        let detail = match exit {
            Ok(TaskExit::Exited(0)) => {
                info!(image = %artifact, "preflight passed");
                return PreflightOutcome::Passed;
            }
            Ok(TaskExit::Exited(code)) => format!("probe exited with status {code}"),
            Ok(TaskExit::NeverStarted(reason)) => {
                format!("probe failed to start: {reason}")
            }
            Err(e) => format!("probe could not be run: {e}"),
        };

        warn!(image = %artifact, %detail, "preflight failed; aborting before any workload is touched");
        self.spawn_diagnostic(control, artifact).await;

        PreflightOutcome::Failed {
            reason: format!("{GATE_FAILURE} ({detail})"),
        }
    }

    async fn spawn_diagnostic(&self, control: &dyn ControlPlane, artifact: &ImageArtifact) {
        match control
            .spawn_diagnostic_task(&self.namespace, artifact, self.env_secret.as_deref())
            .await
        {
            Ok(name) => info!(task = %name, "diagnostic task available"),
            Err(e) => error!(error = %e, "failed to start diagnostic task"),
        }
    }
}
