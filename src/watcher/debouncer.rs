//! Per-path debouncing of modify events.
//!
//! Editors often write a file several times per save (write, truncate,
//! format-on-save). A path is released once it has been quiet for the
//! configured duration, so one save produces one trigger.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Debounces file change events by path.
#[derive(Debug)]
pub struct Debouncer {
    /// Pending changes: path -> last change timestamp.
    pending: HashMap<PathBuf, Instant>,
    /// How long a file must be quiet before it is released.
    duration: Duration,
}

impl Debouncer {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            pending: HashMap::new(),
            duration: Duration::from_millis(debounce_ms),
        }
    }

    /// Record a change, restarting the quiet period for this path.
    pub fn record(&mut self, path: PathBuf) {
        self.pending.insert(path, Instant::now());
    }

    pub fn remove(&mut self, path: &Path) {
        self.pending.remove(path);
    }

    /// Take all paths that have been quiet for the debounce duration, sorted.
    pub fn take_ready(&mut self) -> Vec<PathBuf> {
        let now = Instant::now();
        let mut ready = Vec::new();

        self.pending.retain(|path, last_change| {
            if now.duration_since(*last_change) >= self.duration {
                ready.push(path.clone());
                false
            } else {
                true
            }
        });

        ready.sort();
        ready
    }

    /// Time until the earliest pending path becomes ready, if any is pending.
    pub fn next_ready_in(&self) -> Option<Duration> {
        let now = Instant::now();
        self.pending
            .values()
            .map(|last_change| (*last_change + self.duration).saturating_duration_since(now))
            .min()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
