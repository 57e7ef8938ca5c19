//! Error types for cloud lookups and code uploads.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the name resolver and the upload driver.
#[derive(Error, Debug)]
pub enum AwsError {
    #[error("{operation} failed for {target}: {message}")]
    Sdk {
        operation: &'static str,
        target: String,
        message: String,
    },

    #[error("Stack {stack} has no physical resource for {logical_id}")]
    MissingResource { stack: String, logical_id: String },

    #[error("Failed to read {path} for packaging: {source}")]
    Package {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write code package: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed to resolve {key}: {source}")]
    Resolution {
        key: String,
        #[source]
        source: Box<AwsError>,
    },

    #[error("Background task failed: {0}")]
    Join(String),
}

pub type AwsResult<T> = Result<T, AwsError>;
