//! Timestamped logging for the watch loop.
//!
//! Every line goes to stderr so stdout stays free for command output
//! (`cdkw list`, `cdkw config`).
//!
//! # Configuration
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! cdk_watch = "info"   # session progress
//! ```
//!
//! `RUST_LOG` takes precedence over the settings file:
//! ```bash
//! RUST_LOG=cdk_watch=debug cdkw watch '**'
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Build an `EnvFilter` directive string from the logging section.
///
/// Module overrides are sorted so the directive is stable across runs.
pub fn filter_directive(config: &LoggingConfig) -> String {
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();

    let mut directive = config.default.clone();
    for (module, level) in modules {
        directive.push_str(&format!(",{module}={level}"));
    }
    directive
}

/// Initialize logging with configuration.
///
/// Only the first call takes effect.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directive(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}

/// Initialize logging with the default levels.
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// Log an event scoped to a session or subsystem.
///
/// # Examples
/// ```ignore
/// log_event!("api/Handler", "uploaded");
/// log_event!("watch", "monitoring", "{} files", count);
/// ```
#[macro_export]
macro_rules! log_event {
    ($scope:expr, $event:expr) => {
        tracing::info!("[{}] {}", $scope, $event)
    };
    ($scope:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $scope, $event, format!($($arg)*))
    };
}

/// Debug-only event logging.
#[macro_export]
macro_rules! debug_event {
    ($scope:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $scope, $event)
    };
    ($scope:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $scope, $event, format!($($arg)*))
    };
}
