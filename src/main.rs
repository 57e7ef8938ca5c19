use clap::Parser;

use cdk_watch::Settings;
use cdk_watch::cli::commands::{init, list, watch};
use cdk_watch::cli::{Cli, Commands};
use cdk_watch::io::ExitCode;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings = settings.unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        eprintln!("Using default configuration for now.");
        Settings::default()
    });

    cdk_watch::logging::init_with_config(&settings.logging);

    let result = match &cli.command {
        Commands::Init { force } => init::run_init(*force),
        Commands::Config => init::run_config(&settings),
        Commands::List { glob } => list::run_list(&settings, glob),
        Commands::Watch(args) => watch::run_watch(&settings, args).await,
    };

    match result {
        Ok(()) => ExitCode::Success.into(),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::GeneralError.into()
        }
    }
}
