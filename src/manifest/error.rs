//! Error types for manifest loading and filtering.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from reading or narrowing the watch manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error(
        "cdk-watch manifest file was not found at {path}\nSuggestion: run `cdk synth` on an app using watchable functions, or drop --no-synth"
    )]
    NotFound { path: PathBuf },

    #[error("Failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid path glob '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

pub type ManifestResult<T> = Result<T, ManifestError>;
