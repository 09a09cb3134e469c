//! Shared types used across Capstan crates.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from parsing image references and label selectors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("image reference has no tag or digest: {0}")]
    MissingReference(String),

    #[error("image reference has no registry host: {0}")]
    MissingRegistry(String),

    #[error("unsupported digest algorithm: {0}")]
    UnsupportedDigest(String),

    #[error("label selector must be key=value: {0}")]
    BadSelector(String),
}

/// Immutable reference to a built container image.
///
/// Produced by an external build step; the sequencer never mutates it,
/// only asserts it as the desired image on workloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageArtifact {
    /// Registry host (e.g. "ghcr.io").
    pub registry: String,
    /// Repository path within the registry (e.g. "example/courtflow").
    pub repository: String,
    /// Tag or digest pinning the exact image.
    pub reference: Reference,
}

/// Tag or digest component of an image reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reference {
    Tag(String),
    Digest(String),
}

impl ImageArtifact {
    pub fn new(registry: &str, repository: &str, reference: Reference) -> Self {
        Self {
            registry: registry.to_string(),
            repository: repository.to_string(),
            reference,
        }
    }

    /// Parse a full image reference string.
    ///
    /// Accepts `registry/repo:tag` and `registry/repo@sha256:<hex>`.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let (rest, reference) = if let Some((rest, digest)) = s.rsplit_once('@') {
            if !digest.starts_with("sha256:") {
                return Err(ParseError::UnsupportedDigest(s.to_string()));
            }
            (rest, Reference::Digest(digest.to_string()))
        } else {
            match s.rsplit_once(':') {
                Some((rest, tag)) if !tag.is_empty() && !tag.contains('/') => {
                    (rest, Reference::Tag(tag.to_string()))
                }
                _ => return Err(ParseError::MissingReference(s.to_string())),
            }
        };

        let (registry, repository) = rest
            .split_once('/')
            .ok_or_else(|| ParseError::MissingRegistry(s.to_string()))?;
        if registry.is_empty() || repository.is_empty() {
            return Err(ParseError::MissingRegistry(s.to_string()));
        }

        Ok(Self {
            registry: registry.to_string(),
            repository: repository.to_string(),
            reference,
        })
    }

    pub fn is_digest(&self) -> bool {
        matches!(self.reference, Reference::Digest(_))
    }
}

impl fmt::Display for ImageArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)?;
        match &self.reference {
            Reference::Tag(tag) => write!(f, ":{tag}"),
            Reference::Digest(digest) => write!(f, "@{digest}"),
        }
    }
}

/// A named deployable unit in the target cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub name: String,
    pub namespace: String,
    pub kind: WorkloadKind,
}

/// Whether a workload runs continuously or from a scheduled template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadKind {
    /// Long-running service (a Deployment).
    Service,
    /// Scheduled job template (a CronJob). Image updates only rewrite
    /// the template; no run is triggered.
    Scheduled,
}

impl WorkloadKind {
    /// The cluster resource type this kind maps to.
    pub fn resource(&self) -> &'static str {
        match self {
            WorkloadKind::Service => "deployment",
            WorkloadKind::Scheduled => "cronjob",
        }
    }
}

impl Workload {
    pub fn service(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            kind: WorkloadKind::Service,
        }
    }

    pub fn scheduled(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            kind: WorkloadKind::Scheduled,
        }
    }

    /// Namespace-qualified name, unique within a cluster per kind.
    pub fn qualified(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.resource(), self.name)
    }
}

/// A single `key=value` label selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelector {
    pub key: String,
    pub value: String,
}

impl LabelSelector {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        match s.split_once('=') {
            Some((key, value)) if !key.is_empty() && !value.is_empty() => Ok(Self {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            }),
            _ => Err(ParseError::BadSelector(s.to_string())),
        }
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}
