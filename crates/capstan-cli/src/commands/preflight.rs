use std::path::Path;

use anyhow::Context;

use capstan_cluster::Kubectl;
use capstan_core::CapstanConfig;
use capstan_sequencer::{PreflightCheck, PreflightOutcome};

pub async fn check(
    config_path: &str,
    image: &str,
    kube_context: Option<String>,
) -> anyhow::Result<i32> {
    let config = CapstanConfig::from_file(Path::new(config_path))
        .with_context(|| format!("reading {config_path}"))?;
    let artifact = config.resolve_artifact(image)?;
    let kubectl = Kubectl::discover(kube_context)?;

    let preflight = PreflightCheck::from_config(&config);
    match preflight.run(&kubectl, &artifact).await {
        PreflightOutcome::Passed => {
            println!("✓ preflight passed for {artifact}");
            Ok(0)
        }
        PreflightOutcome::Failed { reason } => {
            println!("✗ preflight failed for {artifact}: {reason}");
            Ok(1)
        }
        PreflightOutcome::Skipped => Ok(0),
    }
}
