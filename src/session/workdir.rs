//! Per-session working directories.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::error::{SessionError, SessionResult};

/// Directory-safe, collision-free form of a logical path.
///
/// `/` becomes `_`, so `Api/Users/Handler` -> `Api_Users_Handler`. Every
/// other byte outside `[A-Za-z0-9.-]`, a literal `_` included, is written as
/// `~XX` hex. A leading `.` is escaped too, so the result is never `.`, `..`
/// or hidden. Distinct keys always give distinct names.
pub fn sanitize_key(key: &str) -> String {
    if key.is_empty() {
        return "~".to_string();
    }

    let mut name = String::with_capacity(key.len());
    for (index, byte) in key.bytes().enumerate() {
        match byte {
            b'/' => name.push('_'),
            b'.' if index == 0 => name.push_str("~2E"),
            b if b.is_ascii_alphanumeric() || b == b'-' || b == b'.' => name.push(b as char),
            b => name.push_str(&format!("~{b:02X}")),
        }
    }
    name
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SessionError {
    let path = path.to_path_buf();
    move |source| SessionError::Workdir { path, source }
}

/// Replace `<out_root>/<sanitized key>` with a copy of `asset_dir`.
///
/// A missing asset directory yields an empty working directory.
pub fn prepare_workdir(asset_dir: &Path, out_root: &Path, key: &str) -> SessionResult<PathBuf> {
    let work_dir = out_root.join(sanitize_key(key));
    if work_dir.exists() {
        std::fs::remove_dir_all(&work_dir).map_err(io_err(&work_dir))?;
    }
    std::fs::create_dir_all(&work_dir).map_err(io_err(&work_dir))?;

    if !asset_dir.is_dir() {
        tracing::warn!(
            "[{key}] asset directory {} not found, starting empty",
            asset_dir.display()
        );
        return Ok(work_dir);
    }

    for entry in WalkDir::new(asset_dir).min_depth(1) {
        let entry = entry.map_err(|e| SessionError::Workdir {
            path: e.path().unwrap_or(asset_dir).to_path_buf(),
            source: e.into(),
        })?;
        let relative = entry.path().strip_prefix(asset_dir).unwrap_or(entry.path());
        let target = work_dir.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(io_err(&target))?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(io_err(&target))?;
        }
    }

    crate::debug_event!(key, "working directory", "{}", work_dir.display());
    Ok(work_dir)
}
