//! capstan.toml configuration parser.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;
use crate::types::{ImageArtifact, ParseError, Reference};

/// Default ceiling on the probe task reaching a running state.
pub const DEFAULT_PROBE_START_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapstanConfig {
    pub artifact: ArtifactConfig,
    pub plan: PlanConfig,
    pub preflight: PreflightConfig,
    pub rollout: Option<RolloutConfig>,
    pub scheduled: Option<ScheduledConfig>,
    pub env: Option<EnvConfig>,
}

/// Where built images live. The build and push themselves are external;
/// this only names the repository that run references resolve against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    pub registry: String,
    pub repository: String,
}

/// The ordered rollout plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    pub namespace: String,
    /// Static service entries, updated strictly in this order.
    pub services: Vec<String>,
    /// Optional label selector; matching services are appended to the
    /// plan after the static entries.
    pub discover: Option<String>,
}

/// The gate run before any workload is touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightConfig {
    /// Command executed in a one-shot task built from the new image.
    pub command: Vec<String>,
    /// Ceiling on the task reaching a running state (e.g. "120s").
    pub start_timeout: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloutConfig {
    /// Optional ceiling per rollout-status wait (e.g. "10m"). Absent
    /// means the platform's own timeout semantics apply.
    pub wait_timeout: Option<String>,
}

/// Scheduled-job templates repointed after a fully green run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledConfig {
    /// Label selector for templates to update (e.g. "image_type=web-prod").
    pub selector: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Named secret bundle injected into ephemeral tasks, passed through
    /// opaquely. Contents are never inspected.
    pub secret: Option<String>,
}

impl CapstanConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CapstanConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Resolve a CLI-supplied image reference against the configured
    /// registry. A bare tag or digest is composed with `[artifact]`;
    /// anything containing a `/` is parsed as a full reference.
    pub fn resolve_artifact(&self, reference: &str) -> Result<ImageArtifact, ParseError> {
        if reference.contains('/') {
            return ImageArtifact::parse(reference);
        }
        let reference = if reference.starts_with("sha256:") {
            Reference::Digest(reference.to_string())
        } else if reference.is_empty() {
            return Err(ParseError::MissingReference(reference.to_string()));
        } else {
            Reference::Tag(reference.to_string())
        };
        Ok(ImageArtifact::new(
            &self.artifact.registry,
            &self.artifact.repository,
            reference,
        ))
    }

    /// Probe start timeout, defaulting to 120s.
    pub fn probe_start_timeout(&self) -> Duration {
        self.preflight
            .start_timeout
            .as_deref()
            .and_then(parse_duration)
            .unwrap_or(DEFAULT_PROBE_START_TIMEOUT)
    }

    /// Per-workload rollout wait ceiling, if configured.
    pub fn rollout_wait_timeout(&self) -> Option<Duration> {
        self.rollout
            .as_ref()
            .and_then(|r| r.wait_timeout.as_deref())
            .and_then(parse_duration)
    }

    /// Secret bundle name for ephemeral task environments.
    pub fn env_secret(&self) -> Option<&str> {
        self.env.as_ref().and_then(|e| e.secret.as_deref())
    }

    /// Scaffold a minimal capstan.toml for a new project.
    pub fn scaffold(registry: &str, repository: &str, namespace: &str) -> Self {
        CapstanConfig {
            artifact: ArtifactConfig {
                registry: registry.to_string(),
                repository: repository.to_string(),
            },
            plan: PlanConfig {
                namespace: namespace.to_string(),
                services: vec!["web".to_string()],
                discover: None,
            },
            preflight: PreflightConfig {
                command: vec![
                    "/bin/sh".to_string(),
                    "-c".to_string(),
                    "./manage.py collectstatic --noinput && ./manage.py migrate --check"
                        .to_string(),
                ],
                start_timeout: Some("120s".to_string()),
            },
            rollout: None,
            scheduled: None,
            env: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[artifact]
registry = "ghcr.io"
repository = "example/courtflow"

[plan]
namespace = "prod"
services = ["web", "celery-prefork", "celery-bulk", "scrape-rss", "retry-webhooks"]
discover = "tier=worker"

[preflight]
command = ["/bin/sh", "-c", "./manage.py migrate --check"]
start_timeout = "90s"

[rollout]
wait_timeout = "10m"

[scheduled]
selector = "image_type=web-prod"

[env]
secret = "cl-env"
"#;

    #[test]
    fn parse_full_config() {
        let config: CapstanConfig = toml::from_str(FULL).unwrap();
        assert_eq!(config.plan.services.len(), 5);
        assert_eq!(config.plan.services[0], "web");
        assert_eq!(config.plan.discover.as_deref(), Some("tier=worker"));
        assert_eq!(config.env_secret(), Some("cl-env"));
        assert_eq!(config.probe_start_timeout(), Duration::from_secs(90));
        assert_eq!(config.rollout_wait_timeout(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn parse_minimal_config() {
        let toml_str = r#"
[artifact]
registry = "ghcr.io"
repository = "example/courtflow"

[plan]
namespace = "prod"
services = ["web"]

[preflight]
command = ["true"]
"#;
        let config: CapstanConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.probe_start_timeout(), DEFAULT_PROBE_START_TIMEOUT);
        assert_eq!(config.rollout_wait_timeout(), None);
        assert!(config.scheduled.is_none());
        assert_eq!(config.env_secret(), None);
    }

    #[test]
    fn resolve_bare_tag() {
        let config: CapstanConfig = toml::from_str(FULL).unwrap();
        let artifact = config.resolve_artifact("v123").unwrap();
        assert_eq!(artifact.to_string(), "ghcr.io/example/courtflow:v123");
    }

    #[test]
    fn resolve_bare_digest() {
        let config: CapstanConfig = toml::from_str(FULL).unwrap();
        let artifact = config.resolve_artifact("sha256:abc123").unwrap();
        assert!(artifact.is_digest());
        assert_eq!(artifact.to_string(), "ghcr.io/example/courtflow@sha256:abc123");
    }

    #[test]
    fn resolve_full_reference_ignores_configured_registry() {
        let config: CapstanConfig = toml::from_str(FULL).unwrap();
        let artifact = config.resolve_artifact("other.io/team/app:v9").unwrap();
        assert_eq!(artifact.registry, "other.io");
    }

    #[test]
    fn scaffold_round_trips() {
        let config = CapstanConfig::scaffold("ghcr.io", "example/app", "prod");
        let toml_str = config.to_toml_string().unwrap();
        let back: CapstanConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.plan.namespace, "prod");
        assert_eq!(back.plan.services, vec!["web".to_string()]);
    }
}
