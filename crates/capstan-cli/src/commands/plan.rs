use std::path::Path;

use anyhow::Context;

use capstan_cluster::Kubectl;
use capstan_core::CapstanConfig;
use capstan_sequencer::RolloutPlan;

pub async fn show(
    config_path: &str,
    format: &str,
    kube_context: Option<String>,
) -> anyhow::Result<i32> {
    let config = CapstanConfig::from_file(Path::new(config_path))
        .with_context(|| format!("reading {config_path}"))?;
    let kubectl = Kubectl::discover(kube_context)?;
    let plan = RolloutPlan::resolve(&config, &kubectl).await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&plan)?),
        _ => {
            for (position, workload) in plan.workloads().iter().enumerate() {
                println!("{}. {}", position + 1, workload.qualified());
            }
        }
    }

    Ok(0)
}
