//! Handler for one session's dependency files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::watcher::{WatchAction, WatchError, WatchHandler};

/// Turns a change to any of a session's files into a cycle trigger.
pub struct SessionFileHandler {
    session: String,
    files: HashSet<PathBuf>,
}

impl SessionFileHandler {
    pub fn new(session: impl Into<String>, files: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            session: session.into(),
            files: files.into_iter().collect(),
        }
    }
}

#[async_trait]
impl WatchHandler for SessionFileHandler {
    fn name(&self) -> &str {
        &self.session
    }

    fn matches(&self, path: &Path) -> bool {
        self.files.contains(path)
    }

    fn tracked_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.files.iter().cloned().collect();
        paths.sort();
        paths
    }

    async fn on_modify(&self, _path: &Path) -> Result<WatchAction, WatchError> {
        Ok(WatchAction::TriggerCycle {
            session: self.session.clone(),
        })
    }
}
