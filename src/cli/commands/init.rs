//! Init and Config commands.

use anyhow::Context;

use crate::config::Settings;

/// Create the default settings file.
pub fn run_init(force: bool) -> anyhow::Result<()> {
    let path = Settings::init_config_file(force)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("Failed to write settings")?;

    println!("Created configuration file at: {}", path.display());
    println!("Edit this file to customize your settings.");
    Ok(())
}

/// Print the effective settings as TOML.
pub fn run_config(config: &Settings) -> anyhow::Result<()> {
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    let toml_str = toml::to_string_pretty(config).context("Failed to render settings")?;
    println!("{toml_str}");
    Ok(())
}
