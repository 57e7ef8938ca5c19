//! Unified file watcher that turns source edits into session cycles.
//!
//! # Architecture
//!
//! ```text
//! UnifiedWatcher
//!   - Single notify::RecommendedWatcher
//!   - Shared PathRegistry (parent directories, non-recursive)
//!   - Shared Debouncer
//!   - Routes modify events to handlers
//!         |
//!    +-------------------+-------------------+
//!    |                   |                   |
//! SessionFileHandler  SessionFileHandler  ...
//!    |                   |
//! CycleGate           CycleGate
//! ```

mod debouncer;
mod error;
mod handler;
pub mod handlers;
mod path_registry;
mod unified;

pub use debouncer::Debouncer;
pub use error::WatchError;
pub use handler::{WatchAction, WatchHandler};
pub use path_registry::PathRegistry;
pub use unified::{UnifiedWatcher, UnifiedWatcherBuilder};
