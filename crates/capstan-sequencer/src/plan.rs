//! Rollout plan construction.
//!
//! A plan is computed once at the start of a run: the static service
//! entries from config, in their declared order, then one dynamic
//! inventory query for label-discovered services. It is never
//! recomputed mid-run, even if the inventory changes underneath.

use serde::Serialize;
use tracing::debug;

use capstan_cluster::ControlPlane;
use capstan_core::{CapstanConfig, LabelSelector, Workload};

use crate::error::{SequencerError, SequencerResult};

/// An ordered sequence of workloads to update. Order is a first-class
/// invariant: earlier entries are assumed safe to update before later
/// ones.
#[derive(Debug, Clone, Serialize)]
pub struct RolloutPlan {
    workloads: Vec<Workload>,
}

impl RolloutPlan {
    /// Build a plan from an explicit workload list.
    pub fn from_workloads(workloads: Vec<Workload>) -> SequencerResult<Self> {
        if workloads.is_empty() {
            return Err(SequencerError::EmptyPlan);
        }
        Ok(Self { workloads })
    }

    /// Resolve the plan from config: static entries first, then one
    /// dynamic lookup against the cluster inventory.
    pub async fn resolve(
        config: &CapstanConfig,
        control: &dyn ControlPlane,
    ) -> SequencerResult<Self> {
        let namespace = &config.plan.namespace;
        let mut workloads: Vec<Workload> = config
            .plan
            .services
            .iter()
            .map(|name| Workload::service(name, namespace))
            .collect();

        if let Some(raw) = &config.plan.discover {
            let selector = LabelSelector::parse(raw)
                .map_err(|e| SequencerError::Config(e.to_string()))?;
            let discovered = control.list_services(namespace, &selector).await?;
            debug!(
                selector = %selector,
                count = discovered.len(),
                "discovered services"
            );
            append_unique(&mut workloads, discovered);
        }

        Self::from_workloads(workloads)
    }

    pub fn workloads(&self) -> &[Workload] {
        &self.workloads
    }

    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }
}

/// Append discovered workloads that are not already in the plan,
/// keeping the inventory's order for the appended tail.
fn append_unique(workloads: &mut Vec<Workload>, discovered: Vec<Workload>) {
    for workload in discovered {
        if !workloads.iter().any(|w| w.qualified() == workload.qualified()) {
            workloads.push(workload);
        }
    }
}
