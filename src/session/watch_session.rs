//! The per-function watch loop.
//!
//! ```text
//!            +-----------------------------------------------+
//!            v                                               |
//!   idle --> compiling (pre-compilation only) --> building --> uploading
//! ```
//!
//! Cycles of one session are strictly sequential: the next cycle starts only
//! after the previous upload settles. Failures in any step are reported to
//! the status sink and never end the loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;

use super::gate::CycleGate;
use crate::aws::{CodeUploader, ResolvedTarget};
use crate::build::{BuildHandle, BuildPlan, Bundler, TypeCompiler};
use crate::io::{StatusMeta, StatusSink, StatusUpdate};

const COMPILING_TEXT: &str = "compiling function code";
const BUILDING_TEXT: &str = "building function code";
const UPLOADING_TEXT: &str = "uploading function code";
const COMPILE_FAILED_HINT: &str = "tsc failed, set logLevel to debug for diagnostics";

/// Collaborators shared by every session of one invocation.
#[derive(Clone)]
pub struct SessionDeps {
    pub bundler: Arc<dyn Bundler>,
    pub compiler: Arc<dyn TypeCompiler>,
    pub uploader: Arc<dyn CodeUploader>,
    pub status: Arc<dyn StatusSink>,
}

/// Observable step of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Compiling,
    Building,
    Uploading,
}

/// One resolved function being watched.
pub struct WatchSession {
    target: ResolvedTarget,
    work_dir: PathBuf,
    files: Vec<PathBuf>,
    prefix: Option<String>,
    plan: BuildPlan,
    handle: Option<Box<dyn BuildHandle>>,
    gate: Arc<CycleGate>,
    deps: SessionDeps,
    state: watch::Sender<SessionState>,
}

impl WatchSession {
    /// `show_prefix` should be set when more than one session runs.
    pub fn new(
        target: ResolvedTarget,
        work_dir: PathBuf,
        files: Vec<PathBuf>,
        show_prefix: bool,
        deps: SessionDeps,
    ) -> Self {
        let plan = BuildPlan::for_entry(&target.entry, &work_dir);
        let prefix = show_prefix.then(|| format!("[{}]", target.key));
        let (state, _) = watch::channel(SessionState::Idle);

        Self {
            target,
            work_dir,
            files,
            prefix,
            plan,
            handle: None,
            gate: Arc::new(CycleGate::new()),
            deps,
            state,
        }
    }

    pub fn key(&self) -> &str {
        &self.target.key
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Files whose modification triggers a cycle.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn gate(&self) -> Arc<CycleGate> {
        Arc::clone(&self.gate)
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Initial cycle, then one cycle per trigger, forever.
    pub async fn run(mut self, skip_initial: bool) {
        self.start(skip_initial).await;
        loop {
            self.gate.acquire().await;
            self.run_cycle().await;
            self.gate.release();
        }
    }

    /// Initial cycle: build to obtain the rebuild handle and, unless skipped,
    /// upload the working directory even when the build failed.
    pub async fn start(&mut self, skip_initial: bool) {
        self.gate.begin();

        if let Some(layer) = self.target.stale_layer() {
            tracing::warn!(
                "[{}] function modules layer is out of sync with published layer version {layer}, this can lead to runtime errors. To fix, do a full `cdk deploy`.",
                self.target.key
            );
        }

        if self.target.entry.pre_compilation() {
            self.compile().await;
        }
        self.build().await;
        if !skip_initial {
            self.upload().await;
        }

        self.set_state(SessionState::Idle);
        crate::log_event!(self.target.key, "waiting for changes");
        self.gate.release();
    }

    /// One triggered cycle: optional compile, rebuild, upload.
    pub async fn run_cycle(&mut self) {
        if self.target.entry.pre_compilation() {
            self.compile().await;
        }
        self.build().await;
        self.upload().await;
        self.set_state(SessionState::Idle);
    }

    async fn compile(&mut self) {
        self.set_state(SessionState::Compiling);
        let key = self.status_key("compiling");
        self.put(&key, StatusUpdate::active(COMPILING_TEXT));

        let options = &self.target.entry.esbuild_options;
        let entry_points = options.entry_points.paths();
        let result = self
            .deps
            .compiler
            .compile(&entry_points, options.tsconfig.as_deref())
            .await;

        match result {
            Ok(()) => self.put(&key, StatusUpdate::settled(COMPILING_TEXT)),
            Err(e) => {
                crate::debug_event!(self.target.key, "compile failed", "{e}");
                // Full compiler diagnostics only when the entry asks for debug logs
                let error = if options.log_level.as_deref() == Some("debug") {
                    e.to_string()
                } else {
                    COMPILE_FAILED_HINT.to_string()
                };
                let update = StatusUpdate::settled(COMPILING_TEXT).with_meta(StatusMeta {
                    prefix: self.prefix.clone(),
                    error: Some(error),
                });
                self.deps.status.put(&key, update);
            }
        }
    }

    async fn build(&mut self) {
        self.set_state(SessionState::Building);
        let key = self.status_key("building");
        self.put(&key, StatusUpdate::active(BUILDING_TEXT));

        // Without a handle (first build, or every build so far failed) start fresh
        let result = match self.handle.take() {
            Some(mut handle) => {
                let result = handle.rebuild().await;
                self.handle = Some(handle);
                result
            }
            None => self
                .deps
                .bundler
                .build(&self.plan)
                .await
                .map(|handle| self.handle = Some(handle)),
        };

        match result {
            Ok(()) => self.put(&key, StatusUpdate::settled(BUILDING_TEXT)),
            Err(e) => {
                tracing::error!("[{}] error building lambda: {e}", self.target.key);
                self.put(&key, StatusUpdate::settled(BUILDING_TEXT).with_error(e.to_string()));
            }
        }
    }

    async fn upload(&mut self) {
        self.set_state(SessionState::Uploading);
        let key = self.status_key("uploading");
        self.put(&key, StatusUpdate::active(UPLOADING_TEXT));

        match self
            .deps
            .uploader
            .upload(&self.work_dir, &self.target.function_name)
            .await
        {
            Ok(()) => {
                crate::debug_event!(self.target.key, "uploaded", "{}", self.target.function_name);
                self.put(&key, StatusUpdate::settled(UPLOADING_TEXT));
            }
            Err(e) => {
                tracing::error!("[{}] upload failed: {e}", self.target.key);
                // Upload failures render the error alone, without the session prefix
                let update = StatusUpdate::settled(UPLOADING_TEXT).with_error(e.to_string());
                self.deps.status.put(&key, update);
            }
        }
    }

    fn status_key(&self, step: &str) -> String {
        format!("{}:{step}", self.target.key)
    }

    fn put(&self, key: &str, update: StatusUpdate) {
        let update = if update.meta.prefix.is_some() {
            update
        } else {
            update.with_prefix(self.prefix.clone())
        };
        self.deps.status.put(key, update);
    }

    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }
}
