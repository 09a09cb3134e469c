//! capstan-cluster — control-plane access for the sequencer.
//!
//! The sequencer never talks to a cluster directly; it goes through the
//! [`ControlPlane`] trait. The production implementation, [`Kubectl`],
//! shells out to the `kubectl` binary, which keeps the update semantics
//! identical to what an operator would do by hand: each call asserts a
//! desired state and the platform converges toward it.

pub mod control;
pub mod error;
pub mod kubectl;

pub use control::{ControlPlane, RolloutStatus, TaskExit};
pub use error::{ClusterError, ClusterResult};
pub use kubectl::Kubectl;
