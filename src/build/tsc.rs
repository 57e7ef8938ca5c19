//! Pre-compilation with the TypeScript compiler.
//!
//! The compiler runs synchronously on a blocking thread; a session waits for
//! it before bundling the emitted `.js` files.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;

use super::command::ToolCommand;
use super::{BuildError, BuildResult};
use crate::project::pre_compilation_flags;

/// Compiles entry points in place, next to their sources.
#[async_trait]
pub trait TypeCompiler: Send + Sync {
    async fn compile(&self, entry_points: &[PathBuf], tsconfig: Option<&Path>) -> BuildResult<()>;
}

/// Drives the `tsc` command-line interface.
#[derive(Debug, Clone)]
pub struct TscCompiler {
    command: ToolCommand,
}

impl TscCompiler {
    pub fn new(command_line: &str) -> BuildResult<Self> {
        Ok(Self {
            command: ToolCommand::parse("tsc", command_line)?,
        })
    }

    /// Full argument list: entry points followed by derived flags.
    pub fn arguments(entry_points: &[PathBuf], tsconfig: Option<&Path>) -> BuildResult<Vec<String>> {
        let mut args: Vec<String> = entry_points
            .iter()
            .map(|path| path.display().to_string())
            .collect();
        args.extend(pre_compilation_flags(tsconfig)?);
        Ok(args)
    }
}

#[async_trait]
impl TypeCompiler for TscCompiler {
    async fn compile(&self, entry_points: &[PathBuf], tsconfig: Option<&Path>) -> BuildResult<()> {
        let args = Self::arguments(entry_points, tsconfig)?;
        crate::debug_event!("tsc", "running", "{}", args.join(" "));

        let command = self.command.clone();
        tokio::task::spawn_blocking(move || {
            command
                .std_command()
                .args(&args)
                .stdin(Stdio::null())
                .output()
                .map_err(|source| BuildError::Spawn {
                    tool: command.name().to_string(),
                    source,
                })
                .and_then(|output| command.check(output))
        })
        .await
        .map_err(|e| BuildError::Join(e.to_string()))?
        .map(|_| ())
    }
}
