//! capstan-sequencer — ordered, halt-on-failure image rollouts.
//!
//! Given a built image and an ordered plan of workloads, the sequencer:
//!
//! 1. Runs the pre-flight gate: a one-shot probe task (asset collection
//!    + pending-migration check) built from the new image. A failing
//!    gate aborts the run before any workload is touched and leaves a
//!    diagnostic task behind for the operator.
//! 2. Updates each workload strictly in plan order, blocking on each
//!    rollout until it converges. The first failure halts the run;
//!    remaining entries are recorded as skipped, never touched.
//! 3. After an all-green run, repoints matching scheduled-job templates
//!    at the new image (best-effort; failures never fail the run).
//!
//! There are no retries and no rollback: every step asserts a desired
//! image and waits for convergence, so re-running the whole sequence
//! with the same artifact is safe.

pub mod error;
pub mod plan;
pub mod preflight;
pub mod report;
pub mod sequencer;

pub use error::{SequencerError, SequencerResult};
pub use plan::RolloutPlan;
pub use preflight::PreflightCheck;
pub use report::{
    PreflightOutcome, RolloutReport, RunStatus, ScheduledFailure, ScheduledUpdateOutcome,
    WorkloadEntry, WorkloadOutcome,
};
pub use sequencer::{Sequencer, SequencerOptions};
