//! CLI argument parsing using clap.

use clap::{
    Args, Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Fast rebuild and upload loop for CDK-deployed Node.js Lambda functions
#[derive(Parser, Debug)]
#[command(
    name = "cdkw",
    version = env!("CARGO_PKG_VERSION"),
    about = "Watch CDK Lambda sources, rebuild on change and push code straight to the deployed functions",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(long, global = true, env = "CDKW_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default .cdkw/settings.toml
    Init {
        /// Overwrite an existing settings file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective settings
    Config,

    /// List manifest entries matching a glob
    List {
        /// Glob over logical paths; `*` stays within a segment, `**` spans segments
        #[arg(default_value = "**")]
        glob: String,
    },

    /// Rebuild and upload matching functions whenever their sources change
    Watch(WatchArgs),
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct WatchArgs {
    /// Glob over logical paths, e.g. `Api/**`
    #[arg(default_value = "**")]
    pub glob: String,

    /// Context passed to synth as key=value (repeatable)
    #[arg(short = 'c', long = "context", value_name = "KEY=VALUE")]
    pub context: Vec<String>,

    /// Override the CDK app command used by synth
    #[arg(short, long)]
    pub app: Option<String>,

    /// AWS named profile for synth, lookups and uploads
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Do not upload when watching starts, only after the first change
    #[arg(long)]
    pub skip_initial: bool,

    /// Use the manifest on disk instead of running synth first
    #[arg(long)]
    pub no_synth: bool,
}
