//! Unified file watcher that routes events to session handlers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};

use crate::session::CycleGate;

use super::debouncer::Debouncer;
use super::error::WatchError;
use super::handler::{WatchAction, WatchHandler};
use super::handlers::SessionFileHandler;
use super::path_registry::PathRegistry;

/// Idle poll interval when nothing is waiting on the debouncer.
const IDLE_TICK: Duration = Duration::from_millis(250);

/// Unified file watcher with pluggable handlers.
///
/// Provides a single `notify::RecommendedWatcher` that routes file events
/// to appropriate handlers based on path matching.
pub struct UnifiedWatcher {
    /// Registered handlers.
    handlers: Vec<Box<dyn WatchHandler>>,
    /// Cycle gates by session name.
    gates: HashMap<String, Arc<CycleGate>>,
    /// Path registry for directory computation.
    registry: PathRegistry,
    /// Shared debouncer for all file events.
    debouncer: Debouncer,
    /// Channel for receiving file events.
    event_rx: mpsc::Receiver<notify::Result<Event>>,
    /// The underlying file watcher.
    watcher: notify::RecommendedWatcher,
    /// Base for relative tracked paths, the directory the watcher started in.
    workspace_root: PathBuf,
}

impl UnifiedWatcher {
    /// Create a builder for configuring the watcher.
    pub fn builder() -> UnifiedWatcherBuilder {
        UnifiedWatcherBuilder::new()
    }

    /// Register tracked paths and start watching their directories.
    ///
    /// Returns the number of directories successfully watched.
    pub fn register(&mut self) -> usize {
        let mut new_dirs = Vec::new();
        for handler in &self.handlers {
            let paths = handler
                .tracked_paths()
                .into_iter()
                .map(|p| absolutize(&self.workspace_root, &p));
            new_dirs.extend(self.registry.add_paths(paths));
        }

        let mut watched = 0;
        for dir in new_dirs {
            match self.watch_directory(&dir) {
                Ok(()) => watched += 1,
                Err(e) => tracing::warn!("[watcher] {e}"),
            }
        }
        watched
    }

    /// Watch until the event channel closes.
    ///
    /// Receives file events from notify, debounces modifications, routes
    /// them to matching handlers and executes the returned actions.
    pub async fn watch(mut self) -> Result<(), WatchError> {
        self.register();

        let total_paths = self.registry.path_count();
        let total_dirs = self.registry.dir_count();
        if total_paths == 0 {
            tracing::warn!("[watcher] no files to watch");
        } else {
            crate::log_event!(
                "watcher",
                "monitoring",
                "{total_paths} files in {total_dirs} directories"
            );
        }

        loop {
            let wait = self.debouncer.next_ready_in().unwrap_or(IDLE_TICK);
            let timeout = sleep(wait);
            tokio::pin!(timeout);

            tokio::select! {
                received = self.event_rx.recv() => {
                    match received {
                        Some(Ok(event)) => self.handle_event(event),
                        Some(Err(e)) => tracing::error!("[watcher] file watch error: {e}"),
                        None => return Err(WatchError::ChannelClosed),
                    }
                }

                _ = &mut timeout => {
                    self.flush().await;
                }
            }
        }
    }

    fn watch_directory(&mut self, dir: &Path) -> Result<(), WatchError> {
        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;
        crate::debug_event!("watcher", "watching", "{}", dir.display());
        Ok(())
    }

    /// Record modify events for tracked paths; everything else is ignored.
    fn handle_event(&mut self, event: Event) {
        if !matches!(event.kind, EventKind::Modify(_)) {
            crate::debug_event!("watcher", "ignored", "{:?}", event.kind);
            return;
        }

        for path in event.paths {
            if self.registry.contains(&path) {
                self.debouncer.record(path);
            }
        }
    }

    /// Process every debounced path that is ready.
    async fn flush(&mut self) {
        for path in self.debouncer.take_ready() {
            self.process_modification(&path).await;
        }
    }

    async fn process_modification(&self, path: &Path) {
        // Editors that save by rename can leave a transient gap
        if !path.exists() {
            crate::debug_event!("watcher", "vanished", "{}", path.display());
            return;
        }

        for handler in &self.handlers {
            if !handler.matches(path) {
                continue;
            }

            crate::debug_event!(handler.name(), "modified", "{}", path.display());

            match handler.on_modify(path).await {
                Ok(action) => {
                    if let Err(e) = self.execute_action(action, handler.name()) {
                        tracing::error!("[{}] action error: {e}", handler.name());
                    }
                }
                Err(e) => {
                    tracing::error!("[{}] handler error: {e}", handler.name());
                }
            }
        }
    }

    fn execute_action(&self, action: WatchAction, handler_name: &str) -> Result<(), WatchError> {
        match action {
            WatchAction::TriggerCycle { session } => {
                let gate = self
                    .gates
                    .get(&session)
                    .ok_or(WatchError::UnknownSession { session })?;
                if !gate.request() {
                    crate::debug_event!(handler_name, "coalesced into pending cycle");
                }
            }
        }
        Ok(())
    }
}

fn absolutize(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Builder for constructing a UnifiedWatcher.
pub struct UnifiedWatcherBuilder {
    handlers: Vec<Box<dyn WatchHandler>>,
    gates: HashMap<String, Arc<CycleGate>>,
    debounce_ms: u64,
}

impl UnifiedWatcherBuilder {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            gates: HashMap::new(),
            debounce_ms: 50,
        }
    }

    /// Route changes to `files` into `gate`.
    pub fn session(
        mut self,
        name: impl Into<String>,
        files: impl IntoIterator<Item = PathBuf>,
        gate: Arc<CycleGate>,
    ) -> Self {
        let name = name.into();
        self.handlers
            .push(Box::new(SessionFileHandler::new(name.clone(), files)));
        self.gates.insert(name, gate);
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    pub fn build(self) -> Result<UnifiedWatcher, WatchError> {
        let workspace_root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        let (tx, rx) = mpsc::channel(256);

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.blocking_send(res);
        })?;

        Ok(UnifiedWatcher {
            handlers: self.handlers,
            gates: self.gates,
            registry: PathRegistry::new(),
            debouncer: Debouncer::new(self.debounce_ms),
            event_rx: rx,
            watcher,
            workspace_root,
        })
    }
}

impl Default for UnifiedWatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, ModifyKind};
    use std::fs;
    use tempfile::TempDir;

    fn modify(path: &Path) -> Event {
        Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content))).add_path(path.into())
    }

    #[tokio::test]
    async fn modify_events_trigger_only_owning_sessions() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let a = root.join("a.ts");
        let b = root.join("b.ts");
        let shared = root.join("shared.ts");
        for file in [&a, &b, &shared] {
            fs::write(file, "export {};").unwrap();
        }

        let gate_a = Arc::new(CycleGate::new());
        let gate_b = Arc::new(CycleGate::new());
        let mut watcher = UnifiedWatcher::builder()
            .session("A", vec![a.clone(), shared.clone()], Arc::clone(&gate_a))
            .session("B", vec![b.clone(), shared.clone()], Arc::clone(&gate_b))
            .debounce_ms(0)
            .build()
            .unwrap();
        assert_eq!(watcher.register(), 1);

        watcher.handle_event(modify(&a));
        watcher.flush().await;
        assert!(gate_a.is_pending());
        assert!(!gate_b.is_pending());

        watcher.handle_event(modify(&shared));
        watcher.flush().await;
        assert!(gate_b.is_pending());
    }

    #[tokio::test]
    async fn non_modify_and_untracked_events_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let tracked = root.join("handler.ts");
        let other = root.join("other.ts");
        fs::write(&tracked, "").unwrap();
        fs::write(&other, "").unwrap();

        let gate = Arc::new(CycleGate::new());
        let mut watcher = UnifiedWatcher::builder()
            .session("Fn", vec![tracked.clone()], Arc::clone(&gate))
            .debounce_ms(0)
            .build()
            .unwrap();
        watcher.register();

        watcher.handle_event(Event::new(EventKind::Create(CreateKind::File)).add_path(tracked.clone()));
        watcher.handle_event(modify(&other));
        watcher.flush().await;
        assert!(!gate.is_pending());
    }

    #[tokio::test]
    async fn bursts_collapse_through_debounce_and_gate() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().canonicalize().unwrap().join("handler.ts");
        fs::write(&file, "").unwrap();

        let gate = Arc::new(CycleGate::new());
        gate.begin();
        let mut watcher = UnifiedWatcher::builder()
            .session("Fn", vec![file.clone()], Arc::clone(&gate))
            .debounce_ms(0)
            .build()
            .unwrap();
        watcher.register();

        for _ in 0..5 {
            watcher.handle_event(modify(&file));
            watcher.flush().await;
        }

        assert!(gate.is_pending());
        assert!(!gate.request());
    }
}
