//! The rollout sequencer — drives a plan to completion or first failure.
//!
//! Strictly sequential by design: one workload converges before the
//! next is touched, which bounds blast radius and keeps the
//! halt-on-first-failure policy well-defined. There is no internal
//! cancellation; aborting the process between steps leaves the cluster
//! in a safe partial state because every step is independently
//! convergent.

use std::time::Duration;

use tracing::{info, warn};

use capstan_cluster::{ControlPlane, RolloutStatus};
use capstan_core::{CapstanConfig, ImageArtifact, LabelSelector, Workload};

use crate::error::{SequencerError, SequencerResult};
use crate::plan::RolloutPlan;
use crate::preflight::PreflightCheck;
use crate::report::{
    PreflightOutcome, RolloutReport, ScheduledFailure, ScheduledUpdateOutcome, WorkloadEntry,
    WorkloadOutcome,
};

/// Knobs for a run, resolved from config.
#[derive(Debug, Clone)]
pub struct SequencerOptions {
    pub namespace: String,
    /// Ceiling per rollout-status wait; `None` delegates to the
    /// platform's own timeout semantics.
    pub wait_timeout: Option<Duration>,
    /// Scheduled templates to repoint after a fully green run.
    pub scheduled_selector: Option<LabelSelector>,
    /// Skip the pre-flight gate (operator re-runs only).
    pub skip_preflight: bool,
}

/// Runs a [`RolloutPlan`] against a [`ControlPlane`].
pub struct Sequencer<'a> {
    control: &'a dyn ControlPlane,
    preflight: PreflightCheck,
    options: SequencerOptions,
}

impl<'a> Sequencer<'a> {
    pub fn new(
        control: &'a dyn ControlPlane,
        preflight: PreflightCheck,
        options: SequencerOptions,
    ) -> Self {
        Self {
            control,
            preflight,
            options,
        }
    }

    /// Build a sequencer from config.
    pub fn from_config(
        control: &'a dyn ControlPlane,
        config: &CapstanConfig,
    ) -> SequencerResult<Self> {
        let scheduled_selector = match &config.scheduled {
            Some(scheduled) => Some(
                LabelSelector::parse(&scheduled.selector)
                    .map_err(|e| SequencerError::Config(e.to_string()))?,
            ),
            None => None,
        };
        Ok(Self::new(
            control,
            PreflightCheck::from_config(config),
            SequencerOptions {
                namespace: config.plan.namespace.clone(),
                wait_timeout: config.rollout_wait_timeout(),
                scheduled_selector,
                skip_preflight: false,
            },
        ))
    }

    pub fn with_skip_preflight(mut self, skip: bool) -> Self {
        self.options.skip_preflight = skip;
        self
    }

    /// Run the full sequence: gate, ordered rollout loop, scheduled
    /// template update. Rollout failures are data in the report, not
    /// errors.
    pub async fn run(&self, artifact: &ImageArtifact, plan: &RolloutPlan) -> RolloutReport {
        let mut outcomes: Vec<WorkloadEntry> = plan
            .workloads()
            .iter()
            .map(|workload| WorkloadEntry {
                workload: workload.clone(),
                outcome: WorkloadOutcome::Pending,
            })
            .collect();

        info!(image = %artifact, workloads = plan.len(), "starting rollout");

        // The gate always runs before any workload mutation.
        let preflight = if self.options.skip_preflight {
            info!("preflight explicitly skipped");
            PreflightOutcome::Skipped
        } else {
            self.preflight.run(self.control, artifact).await
        };

        if matches!(preflight, PreflightOutcome::Failed { .. }) {
            for entry in &mut outcomes {
                entry.outcome = WorkloadOutcome::Skipped;
            }
            return RolloutReport {
                artifact: artifact.clone(),
                preflight,
                outcomes,
                scheduled: ScheduledUpdateOutcome::NotAttempted,
            };
        }

        // Plan order, one at a time. First failure halts; the rest are
        // recorded as skipped and never touched.
        let mut halted = false;
        for entry in &mut outcomes {
            if halted {
                entry.outcome = WorkloadOutcome::Skipped;
                continue;
            }
            entry.outcome = roll_one(
                self.control,
                &entry.workload,
                artifact,
                self.options.wait_timeout,
            )
            .await;
            if let WorkloadOutcome::Failed { reason } = &entry.outcome {
                warn!(
                    workload = %entry.workload.qualified(),
                    %reason,
                    "rollout failed; halting"
                );
                halted = true;
            }
        }

        let scheduled = if halted {
            ScheduledUpdateOutcome::NotAttempted
        } else {
            self.update_scheduled_templates(artifact).await
        };

        let report = RolloutReport {
            artifact: artifact.clone(),
            preflight,
            outcomes,
            scheduled,
        };
        info!(status = ?report.overall(), "rollout finished");
        report
    }

    /// Repoint matching scheduled templates at the new image.
    /// Best-effort: failures are collected and logged, never fatal.
    async fn update_scheduled_templates(
        &self,
        artifact: &ImageArtifact,
    ) -> ScheduledUpdateOutcome {
        let Some(selector) = &self.options.scheduled_selector else {
            return ScheduledUpdateOutcome::NotAttempted;
        };

        let templates = match self
            .control
            .list_scheduled(&self.options.namespace, selector)
            .await
        {
            Ok(templates) => templates,
            Err(e) => {
                warn!(selector = %selector, error = %e, "could not list scheduled templates");
                return ScheduledUpdateOutcome::PartiallyFailed {
                    updated: 0,
                    failures: vec![ScheduledFailure {
                        workload: selector.to_string(),
                        reason: e.to_string(),
                    }],
                };
            }
        };

        let mut updated = 0u32;
        let mut failures = Vec::new();
        for template in &templates {
            match self.control.update_scheduled_image(template, artifact).await {
                Ok(()) => {
                    info!(template = %template.qualified(), "scheduled template updated");
                    updated += 1;
                }
                Err(e) => {
                    warn!(template = %template.qualified(), error = %e, "scheduled template update failed");
                    failures.push(ScheduledFailure {
                        workload: template.qualified(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if failures.is_empty() {
            ScheduledUpdateOutcome::Updated { count: updated }
        } else {
            ScheduledUpdateOutcome::PartiallyFailed { updated, failures }
        }
    }
}

/// Update one workload and block until its rollout converges.
async fn roll_one(
    control: &dyn ControlPlane,
    workload: &Workload,
    artifact: &ImageArtifact,
    ceiling: Option<Duration>,
) -> WorkloadOutcome {
    info!(workload = %workload.qualified(), image = %artifact, "updating image");

    if let Err(e) = control.set_image(workload, artifact).await {
        return WorkloadOutcome::Failed {
            reason: e.to_string(),
        };
    }

    match control.wait_rollout(workload, ceiling).await {
        Ok(RolloutStatus::Healthy) => {
            info!(workload = %workload.qualified(), "rollout converged");
            WorkloadOutcome::Succeeded
        }
        Ok(RolloutStatus::Failed(reason)) => WorkloadOutcome::Failed { reason },
        Err(e) => WorkloadOutcome::Failed {
            reason: e.to_string(),
        },
    }
}
