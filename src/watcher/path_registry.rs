//! Tracked files and the directories that must be watched to see them.
//!
//! Several sessions may depend on the same file (a shared util module); it is
//! tracked and its directory watched once.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// Registry of tracked files and their parent directories.
#[derive(Debug, Default)]
pub struct PathRegistry {
    /// Tracked paths across all handlers.
    paths: HashSet<PathBuf>,
    /// Parent directories of tracked files, watched non-recursively.
    watch_dirs: BTreeSet<PathBuf>,
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one handler's paths, returning directories not watched before.
    pub fn add_paths(&mut self, paths: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
        let mut new_dirs = Vec::new();

        for path in paths {
            let dir = watch_dir_of(&path);
            self.paths.insert(path);

            if self.watch_dirs.insert(dir.clone()) {
                new_dirs.push(dir);
            }
        }

        new_dirs
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    pub fn dir_count(&self) -> usize {
        self.watch_dirs.len()
    }
}

/// Parent directory of a file, `.` for bare file names.
fn watch_dir_of(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_are_deduplicated() {
        let mut registry = PathRegistry::new();

        let new_dirs = registry.add_paths(vec![
            PathBuf::from("/app/src/a.ts"),
            PathBuf::from("/app/src/b.ts"),
            PathBuf::from("/app/lib/c.ts"),
        ]);

        assert_eq!(
            new_dirs,
            vec![PathBuf::from("/app/src"), PathBuf::from("/app/lib")]
        );
        assert_eq!(registry.path_count(), 3);
        assert_eq!(registry.dir_count(), 2);
        assert!(registry.contains(Path::new("/app/src/a.ts")));
    }

    #[test]
    fn shared_files_are_tracked_once() {
        let mut registry = PathRegistry::new();
        let shared = PathBuf::from("/app/src/util.ts");

        let first = registry.add_paths(vec![shared.clone(), PathBuf::from("/app/src/a.ts")]);
        let second = registry.add_paths(vec![shared.clone()]);

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(registry.path_count(), 2);
        assert!(registry.contains(&shared));
        assert!(!registry.contains(Path::new("/elsewhere.ts")));
    }

    #[test]
    fn bare_file_names_watch_the_current_directory() {
        let mut registry = PathRegistry::new();
        let dirs = registry.add_paths(vec![PathBuf::from("handler.ts")]);
        assert_eq!(dirs, vec![PathBuf::from(".")]);
    }
}
