//! Bundler driver.
//!
//! [`Bundler::build`] performs the first build for a session and hands back
//! a [`BuildHandle`]. Later triggers call [`BuildHandle::rebuild`] on that
//! handle.
//!
//! [`EsbuildBundler`] keeps one node process per session holding an
//! `esbuild.context()`, so rebuilds reuse the bundler's parsed module graph
//! instead of starting cold. Requests and replies are single JSON lines:
//!
//! ```text
//! -> {"entryPoints":["src/handler.ts"],"outfile":"...","minify":true,...}
//! <- {"ok":true,"errors":""}
//! -> rebuild
//! <- {"ok":false,"errors":"src/handler.ts:3:7: ERROR: Expected \";\""}
//! ```

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;

use super::command::ToolCommand;
use super::options::BuildPlan;
use super::{BuildError, BuildResult};

/// Node program that owns the esbuild context.
const DRIVER: &str = include_str!("esbuild_driver.js");

/// Line sent to request an incremental rebuild.
const REBUILD_REQUEST: &str = "rebuild";

/// Stderr lines kept for error reports when the driver dies.
const STDERR_TAIL: usize = 20;

/// Retained bundler context for fast rebuilds.
#[async_trait]
pub trait BuildHandle: Send + Sync {
    /// Re-run the build with the options captured at creation time.
    async fn rebuild(&mut self) -> BuildResult<()>;
}

/// Starts incremental builds.
#[async_trait]
pub trait Bundler: Send + Sync {
    /// Run the initial build. No handle is returned when it fails.
    async fn build(&self, plan: &BuildPlan) -> BuildResult<Box<dyn BuildHandle>>;
}

/// Drives esbuild's JavaScript API through a node process per session.
#[derive(Debug, Clone)]
pub struct EsbuildBundler {
    node: ToolCommand,
    module: String,
}

impl EsbuildBundler {
    /// `node_line` runs node (`node`, `npx node@20`); `module` is how the
    /// driver loads esbuild (`esbuild`, or a path such as `./node_modules/esbuild`).
    pub fn new(node_line: &str, module: &str) -> BuildResult<Self> {
        Ok(Self {
            node: ToolCommand::parse("esbuild", node_line)?,
            module: module.to_string(),
        })
    }

    fn driver_command(&self) -> Command {
        let mut command = self.node.tokio_command();
        command.arg("-e").arg(DRIVER).arg(&self.module);
        command
    }
}

#[async_trait]
impl Bundler for EsbuildBundler {
    async fn build(&self, plan: &BuildPlan) -> BuildResult<Box<dyn BuildHandle>> {
        let options = plan.to_build_options()?;
        crate::debug_event!("esbuild", "starting context", "{}", plan.outfile.display());

        let handle = ContextHandle::start(self.node.name(), self.driver_command(), &options).await?;
        Ok(Box::new(handle))
    }
}

#[derive(Debug, Deserialize)]
struct DriverReply {
    ok: bool,
    #[serde(default)]
    errors: String,
}

/// A running context process speaking the line protocol.
pub struct ContextHandle {
    tool: String,
    // Held so the process is killed when the handle is dropped
    _child: Child,
    stdin: ChildStdin,
    replies: Lines<BufReader<ChildStdout>>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
    stderr_task: Option<JoinHandle<()>>,
}

impl ContextHandle {
    /// Spawn `command`, send `options` and wait for the first build.
    ///
    /// A failed first build kills the process and returns the build error.
    pub async fn start(tool: &str, mut command: Command, options: &Value) -> BuildResult<Self> {
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| BuildError::Spawn {
            tool: tool.to_string(),
            source,
        })?;

        let missing = |stream: &str| BuildError::Protocol {
            tool: tool.to_string(),
            reason: format!("{stream} was not captured"),
        };
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        let stderr_tail = Arc::new(Mutex::new(VecDeque::new()));
        let stderr_task = tokio::spawn(drain_stderr(
            tool.to_string(),
            stderr,
            Arc::clone(&stderr_tail),
        ));

        let mut handle = Self {
            tool: tool.to_string(),
            _child: child,
            stdin,
            replies: BufReader::new(stdout).lines(),
            stderr_tail,
            stderr_task: Some(stderr_task),
        };
        handle.request(&options.to_string()).await?;
        Ok(handle)
    }

    async fn request(&mut self, line: &str) -> BuildResult<()> {
        let sent = async {
            self.stdin.write_all(line.as_bytes()).await?;
            self.stdin.write_all(b"\n").await?;
            self.stdin.flush().await
        }
        .await;
        if sent.is_err() {
            return Err(self.exited().await);
        }

        let reply = match self.replies.next_line().await {
            Ok(Some(reply)) => reply,
            Ok(None) | Err(_) => return Err(self.exited().await),
        };

        let reply: DriverReply =
            serde_json::from_str(&reply).map_err(|e| BuildError::Protocol {
                tool: self.tool.clone(),
                reason: format!("{e}: {reply}"),
            })?;

        if reply.ok {
            Ok(())
        } else {
            Err(BuildError::Rejected {
                tool: self.tool.clone(),
                output: reply.errors,
            })
        }
    }

    /// Error for a driver that stopped answering, carrying its last stderr lines.
    async fn exited(&mut self) -> BuildError {
        if let Some(task) = self.stderr_task.take() {
            let _ = tokio::time::timeout(Duration::from_secs(1), task).await;
        }
        let output = self
            .stderr_tail
            .lock()
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");

        BuildError::Failed {
            tool: self.tool.clone(),
            status: "no reply".to_string(),
            output,
        }
    }
}

#[async_trait]
impl BuildHandle for ContextHandle {
    async fn rebuild(&mut self) -> BuildResult<()> {
        crate::debug_event!(self.tool, "rebuild");
        self.request(REBUILD_REQUEST).await
    }
}

async fn drain_stderr(tool: String, stderr: ChildStderr, tail: Arc<Mutex<VecDeque<String>>>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        crate::debug_event!(tool, "stderr", "{line}");
        let mut tail = tail.lock();
        if tail.len() == STDERR_TAIL {
            tail.pop_front();
        }
        tail.push_back(line);
    }
}
