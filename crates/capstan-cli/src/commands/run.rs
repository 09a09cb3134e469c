use std::path::Path;

use anyhow::Context;

use capstan_cluster::Kubectl;
use capstan_core::CapstanConfig;
use capstan_sequencer::{RolloutPlan, RunStatus, Sequencer};

pub async fn run(
    config_path: &str,
    image: &str,
    format: &str,
    skip_preflight: bool,
    kube_context: Option<String>,
) -> anyhow::Result<i32> {
    let config = CapstanConfig::from_file(Path::new(config_path))
        .with_context(|| format!("reading {config_path}"))?;
    let artifact = config.resolve_artifact(image)?;

    let kubectl = Kubectl::discover(kube_context)?;
    let plan = RolloutPlan::resolve(&config, &kubectl).await?;
    let sequencer = Sequencer::from_config(&kubectl, &config)?.with_skip_preflight(skip_preflight);

    let report = sequencer.run(&artifact, &plan).await;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print!("{}", report.render()),
    }

    Ok(match report.overall() {
        RunStatus::Succeeded => 0,
        RunStatus::Failed => 1,
    })
}
