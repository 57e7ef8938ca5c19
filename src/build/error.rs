//! Error types for bundling and pre-compilation.

use thiserror::Error;

use crate::project::TsConfigError;

/// Errors from driving the external bundler or type compiler.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Tool command is empty: {tool}")]
    EmptyCommand { tool: String },

    #[error("Failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {output}")]
    Failed {
        tool: String,
        status: String,
        output: String,
    },

    #[error("{tool} reported errors:\n{output}")]
    Rejected { tool: String, output: String },

    #[error("{tool} sent an unexpected reply: {reason}")]
    Protocol { tool: String, reason: String },

    #[error("Build options could not be encoded: {0}")]
    Options(#[from] serde_json::Error),

    #[error("Compiler options could not be derived: {0}")]
    CompilerOptions(#[from] TsConfigError),

    #[error("Background task failed: {0}")]
    Join(String),
}

pub type BuildResult<T> = Result<T, BuildError>;
