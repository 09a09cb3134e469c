//! End-to-end sequencer behavior against a recording control plane.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use capstan_cluster::{ClusterError, ClusterResult, ControlPlane, RolloutStatus, TaskExit};
use capstan_core::{CapstanConfig, ImageArtifact, LabelSelector, Reference, Workload};
use capstan_sequencer::{
    PreflightCheck, PreflightOutcome, RolloutPlan, RunStatus, ScheduledUpdateOutcome, Sequencer,
    SequencerOptions, WorkloadOutcome,
};

/// Scripted control plane that records every call in order.
struct MockControlPlane {
    calls: Mutex<Vec<String>>,
    probe_exit: TaskExit,
    /// Scripted wait results by qualified name; unlisted workloads
    /// converge healthy.
    rollout_failures: HashMap<String, String>,
    services: Vec<Workload>,
    scheduled: Vec<Workload>,
    /// Qualified names whose template update fails.
    scheduled_failures: Vec<String>,
}

impl MockControlPlane {
    fn green() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            probe_exit: TaskExit::Exited(0),
            rollout_failures: HashMap::new(),
            services: Vec::new(),
            scheduled: Vec::new(),
            scheduled_failures: Vec::new(),
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn set_image_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("set_image "))
            .collect()
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn set_image(
        &self,
        workload: &Workload,
        _artifact: &ImageArtifact,
    ) -> ClusterResult<()> {
        self.record(format!("set_image {}", workload.qualified()));
        Ok(())
    }

    async fn wait_rollout(
        &self,
        workload: &Workload,
        _ceiling: Option<Duration>,
    ) -> ClusterResult<RolloutStatus> {
        self.record(format!("wait_rollout {}", workload.qualified()));
        match self.rollout_failures.get(&workload.qualified()) {
            Some(reason) => Ok(RolloutStatus::Failed(reason.clone())),
            None => Ok(RolloutStatus::Healthy),
        }
    }

    async fn run_probe_task(
        &self,
        _namespace: &str,
        _artifact: &ImageArtifact,
        _command: &[String],
        _env_secret: Option<&str>,
        _start_timeout: Duration,
    ) -> ClusterResult<TaskExit> {
        self.record("probe".to_string());
        Ok(self.probe_exit.clone())
    }

    async fn spawn_diagnostic_task(
        &self,
        _namespace: &str,
        _artifact: &ImageArtifact,
        _env_secret: Option<&str>,
    ) -> ClusterResult<String> {
        self.record("diagnostic".to_string());
        Ok("capstan-diag-1".to_string())
    }

    async fn list_services(
        &self,
        _namespace: &str,
        _selector: &LabelSelector,
    ) -> ClusterResult<Vec<Workload>> {
        self.record("list_services".to_string());
        Ok(self.services.clone())
    }

    async fn list_scheduled(
        &self,
        _namespace: &str,
        _selector: &LabelSelector,
    ) -> ClusterResult<Vec<Workload>> {
        self.record("list_scheduled".to_string());
        Ok(self.scheduled.clone())
    }

    async fn update_scheduled_image(
        &self,
        workload: &Workload,
        _artifact: &ImageArtifact,
    ) -> ClusterResult<()> {
        self.record(format!("update_scheduled {}", workload.qualified()));
        if self.scheduled_failures.contains(&workload.qualified()) {
            return Err(ClusterError::CommandFailed {
                command: "kubectl set image".to_string(),
                stderr: "conflict".to_string(),
            });
        }
        Ok(())
    }
}

const SERVICES: [&str; 5] = [
    "web",
    "celery-prefork",
    "celery-bulk",
    "scrape-rss",
    "retry-webhooks",
];

fn artifact() -> ImageArtifact {
    ImageArtifact::new("ghcr.io", "example/courtflow", Reference::Tag("v123".into()))
}

fn plan() -> RolloutPlan {
    RolloutPlan::from_workloads(
        SERVICES
            .iter()
            .map(|name| Workload::service(name, "prod"))
            .collect(),
    )
    .unwrap()
}

fn preflight() -> PreflightCheck {
    PreflightCheck {
        namespace: "prod".to_string(),
        command: vec!["true".to_string()],
        start_timeout: Duration::from_secs(120),
        env_secret: Some("cl-env".to_string()),
    }
}

fn sequencer<'a>(control: &'a MockControlPlane) -> Sequencer<'a> {
    Sequencer::new(
        control,
        preflight(),
        SequencerOptions {
            namespace: "prod".to_string(),
            wait_timeout: None,
            scheduled_selector: Some(LabelSelector::parse("image_type=web-prod").unwrap()),
            skip_preflight: false,
        },
    )
}

fn outcome_list(report: &capstan_sequencer::RolloutReport) -> Vec<&WorkloadOutcome> {
    report.outcomes.iter().map(|e| &e.outcome).collect()
}

#[tokio::test]
async fn green_run_updates_everything_in_order() {
    let mut control = MockControlPlane::green();
    control.scheduled = vec![
        Workload::scheduled("scrape-rss-cron", "prod"),
        Workload::scheduled("sweep-dockets", "prod"),
    ];

    let report = sequencer(&control).run(&artifact(), &plan()).await;

    assert_eq!(report.overall(), RunStatus::Succeeded);
    assert_eq!(report.preflight, PreflightOutcome::Passed);
    assert!(
        report
            .outcomes
            .iter()
            .all(|e| e.outcome == WorkloadOutcome::Succeeded)
    );
    assert_eq!(
        report.scheduled,
        ScheduledUpdateOutcome::Updated { count: 2 }
    );

    // set_image calls are exactly the plan, in plan order.
    let expected: Vec<String> = SERVICES
        .iter()
        .map(|name| format!("set_image prod/{name}"))
        .collect();
    assert_eq!(control.set_image_calls(), expected);

    // The gate ran before any mutation.
    let calls = control.calls();
    let probe = calls.iter().position(|c| c == "probe").unwrap();
    let first_set = calls.iter().position(|c| c.starts_with("set_image")).unwrap();
    assert!(probe < first_set);
}

#[tokio::test]
async fn preflight_failure_touches_no_workload() {
    let mut control = MockControlPlane::green();
    control.probe_exit = TaskExit::Exited(1);

    let report = sequencer(&control).run(&artifact(), &plan()).await;

    assert_eq!(report.overall(), RunStatus::Failed);
    match &report.preflight {
        PreflightOutcome::Failed { reason } => {
            assert!(reason.contains("unapplied migrations or asset collection failure"));
        }
        other => panic!("expected preflight failure, got {other:?}"),
    }
    assert!(
        report
            .outcomes
            .iter()
            .all(|e| e.outcome == WorkloadOutcome::Skipped)
    );
    assert_eq!(report.scheduled, ScheduledUpdateOutcome::NotAttempted);

    assert!(control.set_image_calls().is_empty());
    assert!(control.calls().contains(&"diagnostic".to_string()));
}

#[tokio::test]
async fn probe_start_timeout_is_a_preflight_failure() {
    let mut control = MockControlPlane::green();
    control.probe_exit =
        TaskExit::NeverStarted("timed out waiting for the condition".to_string());

    let report = sequencer(&control).run(&artifact(), &plan()).await;

    assert_eq!(report.overall(), RunStatus::Failed);
    assert!(control.set_image_calls().is_empty());
    assert!(control.calls().contains(&"diagnostic".to_string()));
}

#[tokio::test]
async fn failure_halts_the_sequence_and_skips_the_rest() {
    let mut control = MockControlPlane::green();
    control.rollout_failures.insert(
        "prod/celery-bulk".to_string(),
        "ImagePullBackOff".to_string(),
    );

    let report = sequencer(&control).run(&artifact(), &plan()).await;

    assert_eq!(report.overall(), RunStatus::Failed);
    assert_eq!(
        outcome_list(&report),
        vec![
            &WorkloadOutcome::Succeeded,
            &WorkloadOutcome::Succeeded,
            &WorkloadOutcome::Failed {
                reason: "ImagePullBackOff".to_string()
            },
            &WorkloadOutcome::Skipped,
            &WorkloadOutcome::Skipped,
        ]
    );

    // Only a prefix of the plan was ever touched.
    assert_eq!(
        control.set_image_calls(),
        vec![
            "set_image prod/web",
            "set_image prod/celery-prefork",
            "set_image prod/celery-bulk"
        ]
    );
    assert_eq!(report.scheduled, ScheduledUpdateOutcome::NotAttempted);

    let (workload, reason) = report.first_failure().unwrap();
    assert_eq!(workload.name, "celery-bulk");
    assert_eq!(reason, "ImagePullBackOff");
}

#[tokio::test]
async fn rerun_against_converged_cluster_is_all_green() {
    // Convergent platform: asserting an already-applied image reports
    // healthy immediately. A re-run of the same artifact must succeed.
    let control = MockControlPlane::green();
    let sequencer = sequencer(&control);

    let first = sequencer.run(&artifact(), &plan()).await;
    let second = sequencer.run(&artifact(), &plan()).await;

    assert_eq!(first.overall(), RunStatus::Succeeded);
    assert_eq!(second.overall(), RunStatus::Succeeded);
    assert_eq!(first.outcomes, second.outcomes);
}

#[tokio::test]
async fn scheduled_template_failures_are_non_fatal() {
    let mut control = MockControlPlane::green();
    control.scheduled = vec![
        Workload::scheduled("scrape-rss-cron", "prod"),
        Workload::scheduled("sweep-dockets", "prod"),
    ];
    control.scheduled_failures = vec!["prod/sweep-dockets".to_string()];

    let report = sequencer(&control).run(&artifact(), &plan()).await;

    assert_eq!(report.overall(), RunStatus::Succeeded);
    match &report.scheduled {
        ScheduledUpdateOutcome::PartiallyFailed { updated, failures } => {
            assert_eq!(*updated, 1);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].workload, "prod/sweep-dockets");
        }
        other => panic!("expected partial failure, got {other:?}"),
    }
}

#[tokio::test]
async fn skip_preflight_runs_no_probe() {
    let control = MockControlPlane::green();
    let report = sequencer(&control)
        .with_skip_preflight(true)
        .run(&artifact(), &plan())
        .await;

    assert_eq!(report.overall(), RunStatus::Succeeded);
    assert_eq!(report.preflight, PreflightOutcome::Skipped);
    assert!(!control.calls().contains(&"probe".to_string()));
}

#[tokio::test]
async fn plan_resolve_appends_discovered_services_after_static_entries() {
    let toml_str = r#"
[artifact]
registry = "ghcr.io"
repository = "example/courtflow"

[plan]
namespace = "prod"
services = ["web", "celery-prefork"]
discover = "tier=worker"

[preflight]
command = ["true"]
"#;
    let config: CapstanConfig = toml::from_str(toml_str).unwrap();

    let mut control = MockControlPlane::green();
    control.services = vec![
        Workload::service("celery-prefork", "prod"),
        Workload::service("retry-webhooks", "prod"),
    ];

    let plan = RolloutPlan::resolve(&config, &control).await.unwrap();
    let names: Vec<&str> = plan.workloads().iter().map(|w| w.name.as_str()).collect();
    assert_eq!(names, vec!["web", "celery-prefork", "retry-webhooks"]);
}
