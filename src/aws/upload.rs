//! Upload driver: ship a working directory as a function's new code.

use std::io::{Cursor, Write};
use std::path::Path;

use async_trait::async_trait;
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::primitives::Blob;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::context::AwsContext;
use super::error::{AwsError, AwsResult};

/// Replaces the deployed code of a function.
#[async_trait]
pub trait CodeUploader: Send + Sync {
    async fn upload(&self, dir: &Path, function_name: &str) -> AwsResult<()>;
}

/// Zip every file under `dir`, named relative to `dir`, in a stable order.
pub fn zip_directory(dir: &Path) -> AwsResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| AwsError::Package {
            path: e.path().unwrap_or(dir).to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let bytes = std::fs::read(path).map_err(|source| AwsError::Package {
            path: path.to_path_buf(),
            source,
        })?;

        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);
        zip.start_file(name, options)?;
        zip.write_all(&bytes).map_err(|source| AwsError::Package {
            path: path.to_path_buf(),
            source,
        })?;
    }

    Ok(zip.finish()?.into_inner())
}

/// Uploads through `UpdateFunctionCode`.
pub struct AwsCodeUploader {
    lambda: aws_sdk_lambda::Client,
}

impl AwsCodeUploader {
    pub async fn new(context: &AwsContext) -> Self {
        let config = context.sdk_config().await;
        Self {
            lambda: aws_sdk_lambda::Client::new(&config),
        }
    }
}

#[async_trait]
impl CodeUploader for AwsCodeUploader {
    async fn upload(&self, dir: &Path, function_name: &str) -> AwsResult<()> {
        let dir = dir.to_path_buf();
        let package = tokio::task::spawn_blocking(move || zip_directory(&dir))
            .await
            .map_err(|e| AwsError::Join(e.to_string()))??;

        crate::debug_event!("upload", "package", "{function_name}: {} bytes", package.len());

        self.lambda
            .update_function_code()
            .function_name(function_name)
            .zip_file(Blob::new(package))
            .send()
            .await
            .map_err(|e| AwsError::Sdk {
                operation: "UpdateFunctionCode",
                target: function_name.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(())
    }
}
