//! List command: show which manifest entries a glob selects.

use anyhow::Context;

use crate::config::Settings;
use crate::manifest::Manifest;

/// Logical paths matching `glob`, in manifest order.
pub fn matching_keys(manifest: &Manifest, glob: &str) -> anyhow::Result<Vec<String>> {
    let filtered = manifest.filter(glob)?;
    Ok(filtered.lambdas.keys().cloned().collect())
}

pub fn run_list(settings: &Settings, glob: &str) -> anyhow::Result<()> {
    let manifest = Manifest::read(&settings.manifest_path)
        .context("Run `cdk synth` (or `cdkw watch`) to generate it")?;

    let keys = matching_keys(&manifest, glob)?;
    if keys.is_empty() {
        eprintln!("No Lambda functions matched {glob}");
    }
    for key in keys {
        println!("{key}");
    }
    Ok(())
}
