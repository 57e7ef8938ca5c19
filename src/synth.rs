//! Infrastructure synthesis before watching.
//!
//! Running `cdk synth` regenerates the watch manifest so that it reflects
//! the current construct tree. A failed synth is fatal.

use std::process::Stdio;

use thiserror::Error;

use crate::build::{BuildError, ToolCommand};
use crate::io::{StatusSink, StatusUpdate};

const STATUS_KEY: &str = "synth";
const STATUS_TEXT: &str = "synthesizing infrastructure";

#[derive(Error, Debug)]
pub enum SynthError {
    #[error("Synthesis failed: {0}")]
    Tool(#[from] BuildError),
}

/// Pass-through options for the synth command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthOptions {
    /// `--app` override.
    pub app: Option<String>,
    /// Credentials profile.
    pub profile: Option<String>,
    /// `key=value` context pairs, each passed as `--context`.
    pub context: Vec<String>,
}

impl SynthOptions {
    /// Arguments following the configured command line.
    pub fn arguments(&self) -> Vec<String> {
        let mut args = vec!["synth".to_string(), "--quiet".to_string()];
        for pair in &self.context {
            args.push("--context".to_string());
            args.push(pair.clone());
        }
        if let Some(app) = &self.app {
            args.push("--app".to_string());
            args.push(app.clone());
        }
        if let Some(profile) = &self.profile {
            args.push("--profile".to_string());
            args.push(profile.clone());
        }
        args
    }
}

/// Run `<command_line> synth ...`, reporting progress under the `synth` key.
pub async fn run_synth(
    command_line: &str,
    options: &SynthOptions,
    status: &dyn StatusSink,
) -> Result<(), SynthError> {
    let command = ToolCommand::parse("cdk", command_line)?;
    let args = options.arguments();
    crate::debug_event!("synth", "running", "{} {}", command_line, args.join(" "));

    status.put(STATUS_KEY, StatusUpdate::active(STATUS_TEXT));
    let result = command
        .tokio_command()
        .args(&args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| BuildError::Spawn {
            tool: command.name().to_string(),
            source,
        })
        .and_then(|output| command.check(output));

    match result {
        Ok(_) => {
            status.put(STATUS_KEY, StatusUpdate::settled(STATUS_TEXT));
            Ok(())
        }
        Err(e) => {
            status.put(
                STATUS_KEY,
                StatusUpdate::settled(STATUS_TEXT).with_error(e.to_string()),
            );
            Err(e.into())
        }
    }
}
