//! Handler trait and action types for the unified watcher.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::WatchError;

/// Actions returned by handlers for the UnifiedWatcher to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchAction {
    /// Schedule a build and upload cycle for a session.
    TriggerCycle { session: String },
}

/// Trait for handlers that process file change events.
///
/// Handlers declare which paths they care about and return actions
/// for the UnifiedWatcher to execute.
#[async_trait]
pub trait WatchHandler: Send + Sync {
    /// Handler name for logging.
    fn name(&self) -> &str;

    /// Check if this handler should process events for the given path.
    fn matches(&self, path: &Path) -> bool;

    /// All paths this handler tracks; their parent directories get watched.
    fn tracked_paths(&self) -> Vec<PathBuf>;

    /// Handle a file modification event (called after debouncing).
    async fn on_modify(&self, path: &Path) -> Result<WatchAction, WatchError>;
}
