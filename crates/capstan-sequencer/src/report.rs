//! Run reporting — per-workload outcomes and the overall verdict.

use serde::{Deserialize, Serialize};

use capstan_core::{ImageArtifact, Workload};

/// Result of one workload's rollout step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkloadOutcome {
    /// Not yet reached. Only present while a run is in progress.
    Pending,
    /// Rollout converged healthy.
    Succeeded,
    /// Rollout failed; the run halted here.
    Failed { reason: String },
    /// Never touched — an earlier step failed first.
    Skipped,
}

/// Result of the pre-flight gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PreflightOutcome {
    Passed,
    Failed { reason: String },
    /// Explicitly skipped by the operator (`--skip-preflight`).
    Skipped,
}

/// Result of the post-run scheduled-template update. Best-effort:
/// never affects the run's overall status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScheduledUpdateOutcome {
    /// Not configured, or the run did not finish green.
    NotAttempted,
    Updated {
        count: u32,
    },
    PartiallyFailed {
        updated: u32,
        failures: Vec<ScheduledFailure>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledFailure {
    pub workload: String,
    pub reason: String,
}

/// Overall status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

/// One plan entry with its outcome, in plan order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadEntry {
    pub workload: Workload,
    pub outcome: WorkloadOutcome,
}

/// The full record of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloutReport {
    pub artifact: ImageArtifact,
    pub preflight: PreflightOutcome,
    /// Per-workload outcomes, in plan order.
    pub outcomes: Vec<WorkloadEntry>,
    pub scheduled: ScheduledUpdateOutcome,
}

impl RolloutReport {
    /// Succeeded iff the gate passed (or was explicitly skipped) and
    /// every workload converged. Scheduled-template failures never
    /// flip this.
    pub fn overall(&self) -> RunStatus {
        if matches!(self.preflight, PreflightOutcome::Failed { .. }) {
            return RunStatus::Failed;
        }
        let all_green = self
            .outcomes
            .iter()
            .all(|entry| entry.outcome == WorkloadOutcome::Succeeded);
        if all_green {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        }
    }

    /// The workload the run halted on, if any.
    pub fn first_failure(&self) -> Option<(&Workload, &str)> {
        self.outcomes.iter().find_map(|entry| match &entry.outcome {
            WorkloadOutcome::Failed { reason } => Some((&entry.workload, reason.as_str())),
            _ => None,
        })
    }

    /// Human-readable rendering for the CLI's text output.
    pub fn render(&self) -> String {
        let mut out = format!("rollout of {}\n", self.artifact);

        match &self.preflight {
            PreflightOutcome::Passed => out.push_str("  preflight: passed\n"),
            PreflightOutcome::Skipped => out.push_str("  preflight: skipped\n"),
            PreflightOutcome::Failed { reason } => {
                out.push_str(&format!("  preflight: failed — {reason}\n"));
            }
        }

        for entry in &self.outcomes {
            let line = match &entry.outcome {
                WorkloadOutcome::Pending => "pending".to_string(),
                WorkloadOutcome::Succeeded => "succeeded".to_string(),
                WorkloadOutcome::Failed { reason } => format!("failed — {reason}"),
                WorkloadOutcome::Skipped => "skipped".to_string(),
            };
            out.push_str(&format!("  {}: {line}\n", entry.workload.qualified()));
        }

        match &self.scheduled {
            ScheduledUpdateOutcome::NotAttempted => {}
            ScheduledUpdateOutcome::Updated { count } => {
                out.push_str(&format!("  scheduled templates: {count} updated\n"));
            }
            ScheduledUpdateOutcome::PartiallyFailed { updated, failures } => {
                out.push_str(&format!(
                    "  scheduled templates: {updated} updated, {} failed\n",
                    failures.len()
                ));
                for failure in failures {
                    out.push_str(&format!(
                        "    {}: {}\n",
                        failure.workload, failure.reason
                    ));
                }
            }
        }

        let overall = match self.overall() {
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        };
        out.push_str(&format!("overall: {overall}\n"));
        out
    }
}
