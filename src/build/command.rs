//! External tool invocation shared by the bundler, compiler and synth steps.

use std::process::Output;

use super::{BuildError, BuildResult};

/// A configured command line such as `npx tsc`, split into program and
/// leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    name: String,
    program: String,
    args: Vec<String>,
}

impl ToolCommand {
    /// Split a command line on whitespace. `name` is used in errors and logs.
    pub fn parse(name: &str, command_line: &str) -> BuildResult<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or_else(|| BuildError::EmptyCommand {
            tool: name.to_string(),
        })?;

        Ok(Self {
            name: name.to_string(),
            program,
            args: parts.collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn leading_args(&self) -> &[String] {
        &self.args
    }

    /// Asynchronous command with the leading arguments applied.
    pub fn tokio_command(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);
        command
    }

    /// Blocking command with the leading arguments applied.
    pub fn std_command(&self) -> std::process::Command {
        let mut command = std::process::Command::new(&self.program);
        command.args(&self.args);
        command
    }

    /// Turn a finished process into a result, keeping its diagnostics on failure.
    pub fn check(&self, output: Output) -> BuildResult<Output> {
        if output.status.success() {
            return Ok(output);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        // tsc reports diagnostics on stdout, esbuild on stderr
        let text = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };

        Err(BuildError::Failed {
            tool: self.name.clone(),
            status: output.status.to_string(),
            output: text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_program_and_leading_args() {
        let command = ToolCommand::parse("esbuild", "npx  esbuild").unwrap();
        assert_eq!(command.program(), "npx");
        assert_eq!(command.leading_args(), ["esbuild".to_string()]);
        assert_eq!(command.name(), "esbuild");
    }

    #[test]
    fn empty_command_is_rejected() {
        let err = ToolCommand::parse("tsc", "   ").unwrap_err();
        assert!(matches!(err, BuildError::EmptyCommand { .. }));
    }
}
