//! Error types for session setup.

use std::path::PathBuf;
use thiserror::Error;

use crate::watcher::WatchError;

/// Failures that prevent watching from starting. Per-cycle failures are
/// reported through the status sink instead.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to prepare working directory {path}: {source}")]
    Workdir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{first} and {second} would share the working directory {path}")]
    WorkdirConflict {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("Background task failed: {0}")]
    Join(String),
}

pub type SessionResult<T> = Result<T, SessionError>;
