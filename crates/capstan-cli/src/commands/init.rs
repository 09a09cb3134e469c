use std::path::Path;

use anyhow::bail;

use capstan_core::CapstanConfig;

pub fn init(path: &str) -> anyhow::Result<i32> {
    let output = Path::new(path).join("capstan.toml");
    if output.exists() {
        bail!("{} already exists", output.display());
    }

    let config = CapstanConfig::scaffold("ghcr.io", "example/app", "default");
    std::fs::write(&output, config.to_toml_string()?)?;
    println!("✓ Generated {}", output.display());
    println!("Edit [artifact] and [plan] before the first run.");

    Ok(0)
}
