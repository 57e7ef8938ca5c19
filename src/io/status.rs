//! Injected status reporting.
//!
//! Sessions publish progress through a [`StatusSink`] keyed by session and
//! step (`Api/Handler:building`). The sink is purely observational: nothing
//! it does feeds back into the watch loop.

use parking_lot::Mutex;

use super::status_line::{StatusBoard, StatusLine};

/// Optional decorations for a status row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusMeta {
    /// Shown before the text, e.g. the session's logical path.
    pub prefix: Option<String>,
    /// Failure detail; a settled update with an error renders as failed.
    pub error: Option<String>,
}

/// One state change for a status key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub text: String,
    pub active: bool,
    pub meta: StatusMeta,
}

impl StatusUpdate {
    /// Work in progress.
    pub fn active(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            active: true,
            meta: StatusMeta::default(),
        }
    }

    /// Work finished, successfully unless an error is attached.
    pub fn settled(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            active: false,
            meta: StatusMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: StatusMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.meta.prefix = prefix;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.meta.error = Some(error.into());
        self
    }

    pub fn is_failure(&self) -> bool {
        !self.active && self.meta.error.is_some()
    }
}

/// Receives keyed status updates.
pub trait StatusSink: Send + Sync {
    fn put(&self, key: &str, update: StatusUpdate);
}

/// Status for an interactive terminal, or the log when stderr is redirected.
pub struct TerminalStatus {
    board: Option<StatusLine<StatusBoard>>,
}

impl TerminalStatus {
    /// Draw on stderr when it is a TTY, otherwise log each update.
    pub fn new() -> Self {
        let is_tty = is_terminal::is_terminal(std::io::stderr());
        if is_tty {
            Self::animated()
        } else {
            Self::logging()
        }
    }

    pub fn animated() -> Self {
        Self {
            board: Some(StatusLine::new(StatusBoard::new())),
        }
    }

    pub fn logging() -> Self {
        Self { board: None }
    }

    fn log(key: &str, update: &StatusUpdate) {
        let prefix = update
            .meta
            .prefix
            .as_deref()
            .map(|p| format!("{p} "))
            .unwrap_or_default();

        if let Some(error) = &update.meta.error {
            tracing::error!("[status] {key}: {prefix}{} failed: {error}", update.text);
        } else if update.active {
            tracing::info!("[status] {key}: {prefix}{}...", update.text);
        } else {
            tracing::info!("[status] {key}: {prefix}{}", update.text);
        }
    }
}

impl Default for TerminalStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusSink for TerminalStatus {
    fn put(&self, key: &str, update: StatusUpdate) {
        match &self.board {
            Some(board) => {
                // Failures also reach the log so they survive the next redraw
                if update.is_failure() {
                    Self::log(key, &update);
                }
                board.put(key, update);
            }
            None => Self::log(key, &update),
        }
    }
}

/// Keeps every update in order, for assertions.
#[derive(Default)]
pub struct RecordingStatus {
    updates: Mutex<Vec<(String, StatusUpdate)>>,
}

impl RecordingStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(key, update)` pair received so far.
    pub fn updates(&self) -> Vec<(String, StatusUpdate)> {
        self.updates.lock().clone()
    }

    /// Updates published under `key`.
    pub fn for_key(&self, key: &str) -> Vec<StatusUpdate> {
        self.updates
            .lock()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, update)| update.clone())
            .collect()
    }

    /// Latest update for `key`.
    pub fn last(&self, key: &str) -> Option<StatusUpdate> {
        self.for_key(key).pop()
    }

    pub fn failures(&self) -> Vec<(String, StatusUpdate)> {
        self.updates
            .lock()
            .iter()
            .filter(|(_, update)| update.is_failure())
            .cloned()
            .collect()
    }
}

impl StatusSink for RecordingStatus {
    fn put(&self, key: &str, update: StatusUpdate) {
        self.updates.lock().push((key.to_string(), update));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_keeps_order_per_key() {
        let status = RecordingStatus::new();
        status.put("a", StatusUpdate::active("building"));
        status.put("b", StatusUpdate::active("uploading"));
        status.put("a", StatusUpdate::settled("built"));

        let a = status.for_key("a");
        assert_eq!(a.len(), 2);
        assert!(a[0].active);
        assert_eq!(status.last("a").unwrap().text, "built");
        assert_eq!(status.updates().len(), 3);
        assert!(status.failures().is_empty());
    }

    #[test]
    fn settled_update_with_error_is_a_failure() {
        let update = StatusUpdate::settled("upload").with_error("AccessDenied");
        assert!(update.is_failure());
        assert!(!StatusUpdate::active("upload").with_error("x").is_failure());
    }

    #[test]
    fn logging_status_accepts_updates() {
        let status = TerminalStatus::logging();
        status.put("synth", StatusUpdate::active("synthesizing"));
        status.put("synth", StatusUpdate::settled("synthesized"));
    }
}
