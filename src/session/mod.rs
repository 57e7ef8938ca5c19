//! Watch sessions: one long-lived build and upload loop per resolved function.
//!
//! [`prepare_sessions`] gives every target its working directory and watch
//! set; [`run_sessions`] starts all of them concurrently behind a single
//! file watcher.

mod error;
mod gate;
mod watch_session;
mod workdir;

pub use error::{SessionError, SessionResult};
pub use gate::CycleGate;
pub use watch_session::{SessionDeps, SessionState, WatchSession};
pub use workdir::{prepare_workdir, sanitize_key};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::task::JoinSet;

use crate::aws::ResolvedTarget;
use crate::manifest::Manifest;
use crate::project::DependencyScanner;
use crate::watcher::UnifiedWatcher;

/// Invocation-wide session settings.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Root of the per-session working directories.
    pub out_dir: PathBuf,
    pub skip_initial: bool,
    pub debounce_ms: u64,
}

/// Build a session for every target, in target order.
pub async fn prepare_sessions(
    manifest: &Manifest,
    targets: Vec<ResolvedTarget>,
    options: &WatchOptions,
    deps: SessionDeps,
) -> SessionResult<Vec<WatchSession>> {
    let show_prefix = targets.len() > 1;
    check_distinct_workdirs(&targets, &options.out_dir)?;
    let mut sessions = Vec::with_capacity(targets.len());

    for target in targets {
        let asset_dir = manifest.asset_dir(&target.entry);
        let work_dir = prepare_workdir(&asset_dir, &options.out_dir, &target.key)?;

        let esbuild = &target.entry.esbuild_options;
        let tsconfig = esbuild.tsconfig.clone();
        let entry_points = esbuild.entry_points.paths();
        let files = tokio::task::spawn_blocking(move || {
            DependencyScanner::new(tsconfig.as_deref()).scan(&entry_points)
        })
        .await
        .map_err(|e| SessionError::Join(e.to_string()))?;

        crate::debug_event!(target.key, "watching", "{} files", files.len());
        sessions.push(WatchSession::new(
            target,
            work_dir,
            files,
            show_prefix,
            deps.clone(),
        ));
    }

    Ok(sessions)
}

/// Fail before touching the disk when two targets would share a working
/// directory. Names are compared case-insensitively for filesystems that
/// fold case.
fn check_distinct_workdirs(targets: &[ResolvedTarget], out_root: &Path) -> SessionResult<()> {
    let mut owners: HashMap<String, &str> = HashMap::new();
    for target in targets {
        let name = sanitize_key(&target.key);
        if let Some(first) = owners.insert(name.to_lowercase(), &target.key) {
            return Err(SessionError::WorkdirConflict {
                path: out_root.join(name),
                first: first.to_string(),
                second: target.key.clone(),
            });
        }
    }
    Ok(())
}

/// Run every session and the shared watcher until the process ends.
pub async fn run_sessions(sessions: Vec<WatchSession>, options: &WatchOptions) -> SessionResult<()> {
    let mut builder = UnifiedWatcher::builder().debounce_ms(options.debounce_ms);
    for session in &sessions {
        builder = builder.session(session.key(), session.files().to_vec(), session.gate());
    }
    let watcher = builder.build()?;

    let mut running = JoinSet::new();
    for session in sessions {
        running.spawn(session.run(options.skip_initial));
    }

    // Sessions never finish on their own; the watcher only returns on failure
    watcher.watch().await?;
    running.abort_all();
    Ok(())
}
