//! kubectl-backed control plane.
//!
//! Every operation maps onto the kubectl verb an operator would use:
//! `set image`, `rollout status`, `run`, `get -o json`. Output parsing
//! stays minimal — exit codes carry success/failure, stderr carries the
//! reason, and list results come back as JSON.

use std::path::PathBuf;
use std::process::Output;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use capstan_core::{ImageArtifact, LabelSelector, Workload, WorkloadKind};

use crate::control::{ControlPlane, RolloutStatus, TaskExit};
use crate::error::{ClusterError, ClusterResult};

/// Production [`ControlPlane`] that shells out to `kubectl`.
pub struct Kubectl {
    binary: PathBuf,
    context: Option<String>,
}

impl Kubectl {
    /// Locate the kubectl binary and build a client.
    ///
    /// Search order:
    /// 1. `$CAPSTAN_KUBECTL_PATH` environment variable
    /// 2. `kubectl` on `$PATH`
    pub fn discover(context: Option<String>) -> ClusterResult<Self> {
        if let Ok(path) = std::env::var("CAPSTAN_KUBECTL_PATH") {
            let binary = PathBuf::from(&path);
            if binary.is_file() {
                debug!(path = %binary.display(), "found kubectl (from CAPSTAN_KUBECTL_PATH)");
                return Ok(Self { binary, context });
            }
            return Err(ClusterError::BinaryNotFound(format!(
                "CAPSTAN_KUBECTL_PATH points at {path}, which is not a file"
            )));
        }

        if let Ok(output) = std::process::Command::new("which").arg("kubectl").output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    debug!(%path, "found kubectl (system PATH)");
                    return Ok(Self {
                        binary: PathBuf::from(path),
                        context,
                    });
                }
            }
        }

        Err(ClusterError::BinaryNotFound(
            "kubectl not on $PATH; set CAPSTAN_KUBECTL_PATH to point at your binary"
                .to_string(),
        ))
    }

    /// Client with an explicit binary path.
    pub fn with_binary(binary: PathBuf, context: Option<String>) -> Self {
        Self { binary, context }
    }

    fn base_args(&self, namespace: &str) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(context) = &self.context {
            args.push("--context".to_string());
            args.push(context.clone());
        }
        args.push("-n".to_string());
        args.push(namespace.to_string());
        args
    }

    async fn exec(&self, args: &[String]) -> ClusterResult<Output> {
        let rendered = format!("kubectl {}", args.join(" "));
        debug!(command = %rendered, "exec");
        Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|source| ClusterError::Spawn {
                command: rendered,
                source,
            })
    }

    /// Run kubectl and fail on a non-zero exit, returning stdout.
    async fn exec_checked(&self, args: &[String]) -> ClusterResult<String> {
        let output = self.exec(args).await?;
        if !output.status.success() {
            return Err(ClusterError::CommandFailed {
                command: format!("kubectl {}", args.join(" ")),
                stderr: stderr_tail(&output),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl ControlPlane for Kubectl {
    async fn set_image(
        &self,
        workload: &Workload,
        artifact: &ImageArtifact,
    ) -> ClusterResult<()> {
        let mut args = self.base_args(&workload.namespace);
        args.extend(set_image_args(workload, artifact));
        self.exec_checked(&args).await?;
        Ok(())
    }

    async fn wait_rollout(
        &self,
        workload: &Workload,
        ceiling: Option<Duration>,
    ) -> ClusterResult<RolloutStatus> {
        let mut args = self.base_args(&workload.namespace);
        args.extend(rollout_status_args(workload, ceiling));

        let output = self.exec(&args).await?;
        if output.status.success() {
            Ok(RolloutStatus::Healthy)
        } else {
            Ok(RolloutStatus::Failed(stderr_tail(&output)))
        }
    }

    async fn run_probe_task(
        &self,
        namespace: &str,
        artifact: &ImageArtifact,
        command: &[String],
        env_secret: Option<&str>,
        start_timeout: Duration,
    ) -> ClusterResult<TaskExit> {
        let name = format!("capstan-probe-{}", epoch_secs());
        let mut args = self.base_args(namespace);
        args.extend(run_task_args(
            &name,
            artifact,
            command,
            env_secret,
            Some(start_timeout),
        ));

        info!(task = %name, image = %artifact, "running probe task");
        let output = self.exec(&args).await?;

        if output.status.success() {
            return Ok(TaskExit::Exited(0));
        }
        let stderr = stderr_tail(&output);
        if stderr.contains("timed out waiting") {
            return Ok(TaskExit::NeverStarted(stderr));
        }
        match output.status.code() {
            Some(code) => Ok(TaskExit::Exited(code)),
            None => Ok(TaskExit::NeverStarted(
                "probe task terminated by signal".to_string(),
            )),
        }
    }

    async fn spawn_diagnostic_task(
        &self,
        namespace: &str,
        artifact: &ImageArtifact,
        env_secret: Option<&str>,
    ) -> ClusterResult<String> {
        let name = format!("capstan-diag-{}", epoch_secs());
        let command = ["sleep".to_string(), "infinity".to_string()];
        let mut args = self.base_args(namespace);
        args.extend(diagnostic_task_args(&name, artifact, &command, env_secret));

        self.exec_checked(&args).await?;
        info!(
            task = %name,
            namespace,
            "diagnostic task started; attach with: kubectl exec -it {} -n {} -- sh",
            name,
            namespace,
        );
        Ok(name)
    }

    async fn list_services(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> ClusterResult<Vec<Workload>> {
        let mut args = self.base_args(namespace);
        args.extend(list_args(WorkloadKind::Service, selector));
        let stdout = self.exec_checked(&args).await?;
        parse_workload_list(&stdout, WorkloadKind::Service)
    }

    async fn list_scheduled(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> ClusterResult<Vec<Workload>> {
        let mut args = self.base_args(namespace);
        args.extend(list_args(WorkloadKind::Scheduled, selector));
        let stdout = self.exec_checked(&args).await?;
        parse_workload_list(&stdout, WorkloadKind::Scheduled)
    }

    async fn update_scheduled_image(
        &self,
        workload: &Workload,
        artifact: &ImageArtifact,
    ) -> ClusterResult<()> {
        if workload.kind != WorkloadKind::Scheduled {
            warn!(workload = %workload.qualified(), "update_scheduled_image on a non-scheduled workload");
        }
        let mut args = self.base_args(&workload.namespace);
        args.extend(set_image_args(workload, artifact));
        self.exec_checked(&args).await?;
        Ok(())
    }
}

// ── Argument builders ──────────────────────────────────────────────
//
// Kept as free functions so the exact kubectl invocations are unit
// testable without spawning anything.

fn set_image_args(workload: &Workload, artifact: &ImageArtifact) -> Vec<String> {
    vec![
        "set".to_string(),
        "image".to_string(),
        format!("{}/{}", workload.kind.resource(), workload.name),
        format!("*={artifact}"),
    ]
}

fn rollout_status_args(workload: &Workload, ceiling: Option<Duration>) -> Vec<String> {
    let mut args = vec![
        "rollout".to_string(),
        "status".to_string(),
        format!("{}/{}", workload.kind.resource(), workload.name),
    ];
    if let Some(ceiling) = ceiling {
        args.push(format!("--timeout={}s", ceiling.as_secs()));
    }
    args
}

/// `kubectl run` for the one-shot probe: attached, deleted on exit, and
/// bounded on how long the pod may take to start running.
fn run_task_args(
    name: &str,
    artifact: &ImageArtifact,
    command: &[String],
    env_secret: Option<&str>,
    start_timeout: Option<Duration>,
) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        name.to_string(),
        format!("--image={artifact}"),
        "--restart=Never".to_string(),
        "--attach".to_string(),
        "--rm".to_string(),
        "--quiet".to_string(),
    ];
    if let Some(timeout) = start_timeout {
        args.push(format!("--pod-running-timeout={}s", timeout.as_secs()));
    }
    args.push(format!(
        "--overrides={}",
        pod_overrides(name, artifact, command, env_secret)
    ));
    args.push("--command".to_string());
    args.push("--".to_string());
    args.extend(command.iter().cloned());
    args
}

/// `kubectl run` for the diagnostic task: detached, left running.
fn diagnostic_task_args(
    name: &str,
    artifact: &ImageArtifact,
    command: &[String],
    env_secret: Option<&str>,
) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        name.to_string(),
        format!("--image={artifact}"),
        "--restart=Never".to_string(),
    ];
    args.push(format!(
        "--overrides={}",
        pod_overrides(name, artifact, command, env_secret)
    ));
    args.push("--command".to_string());
    args.push("--".to_string());
    args.extend(command.iter().cloned());
    args
}

fn list_args(kind: WorkloadKind, selector: &LabelSelector) -> Vec<String> {
    vec![
        "get".to_string(),
        format!("{}s", kind.resource()),
        "-l".to_string(),
        selector.to_string(),
        "-o".to_string(),
        "json".to_string(),
    ]
}

/// Pod-spec overrides carrying the opaque env-secret reference.
fn pod_overrides(
    name: &str,
    artifact: &ImageArtifact,
    command: &[String],
    env_secret: Option<&str>,
) -> String {
    let mut container = serde_json::json!({
        "name": name,
        "image": artifact.to_string(),
        "command": command,
    });
    if let Some(secret) = env_secret {
        container["envFrom"] = serde_json::json!([{ "secretRef": { "name": secret } }]);
    }
    serde_json::json!({
        "spec": { "containers": [container] }
    })
    .to_string()
}

/// Parse `kubectl get <resource>s -o json` output into workloads, in
/// the order the inventory returned them.
fn parse_workload_list(stdout: &str, kind: WorkloadKind) -> ClusterResult<Vec<Workload>> {
    let value: serde_json::Value =
        serde_json::from_str(stdout).map_err(|e| ClusterError::Parse {
            what: "workload list".to_string(),
            detail: e.to_string(),
        })?;
    let items = value["items"].as_array().ok_or_else(|| ClusterError::Parse {
        what: "workload list".to_string(),
        detail: "missing items array".to_string(),
    })?;

    let mut workloads = Vec::with_capacity(items.len());
    for item in items {
        let metadata = &item["metadata"];
        let (name, namespace) = match (metadata["name"].as_str(), metadata["namespace"].as_str())
        {
            (Some(name), Some(namespace)) => (name, namespace),
            _ => {
                return Err(ClusterError::Parse {
                    what: "workload list".to_string(),
                    detail: "item missing metadata.name or metadata.namespace".to_string(),
                });
            }
        };
        workloads.push(Workload {
            name: name.to_string(),
            namespace: namespace.to_string(),
            kind,
        });
    }
    Ok(workloads)
}

fn stderr_tail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let trimmed = stderr.trim();
    match trimmed.lines().last() {
        Some(line) if !line.is_empty() => line.to_string(),
        _ => format!("exit status {:?}", output.status.code()),
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
