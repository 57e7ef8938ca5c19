//! Status line display with cursor hiding support and a multi-key status board.
//!
//! Forked from status-line crate (MIT license) with modifications:
//! - Hide cursor during display to prevent visual artifacts on spinners
//! - Show cursor when status line is cleared
//! - Render one row per status key so concurrent sessions share a single
//!   refresh loop instead of fighting over the terminal
//!
//! Original: <https://github.com/pkolaczk/status-line>

use std::fmt::Display;
use std::io::Write;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use owo_colors::OwoColorize;
use parking_lot::Mutex;

use super::status::StatusUpdate;

const CURSOR_HIDE: &str = "\x1b[?25l";
const CURSOR_SHOW: &str = "\x1b[?25h";
const ERASE_DOWN: &str = "\x1b[J";
const CURSOR_LEFT: &str = "\r";
const CURSOR_PREV_LINE: &str = "\x1b[1F";

// Terminal writes are best effort; a closed stderr must not take the watch loop down.
fn redraw(ansi: bool, state: &impl Display) {
    let stderr = std::io::stderr();
    let mut stderr = stderr.lock();
    let contents = format!("{state}");
    if contents.is_empty() {
        return;
    }
    if ansi {
        let line_count = contents.chars().filter(|c| *c == '\n').count();

        // Hide cursor, erase, write content, move back to start
        let _ = write!(
            &mut stderr,
            "{CURSOR_HIDE}{ERASE_DOWN}{contents}{CURSOR_LEFT}"
        );

        // Move cursor back to first line, keeping it hidden
        for _ in 0..line_count {
            let _ = write!(&mut stderr, "{CURSOR_PREV_LINE}");
        }
    } else {
        let _ = writeln!(&mut stderr, "{contents}");
    }
}

fn clear(ansi: bool) {
    if ansi {
        let stderr = std::io::stderr();
        let mut stderr = stderr.lock();
        // Erase and show cursor when clearing
        let _ = write!(&mut stderr, "{ERASE_DOWN}{CURSOR_SHOW}");
    }
}

struct State<D> {
    data: D,
    visible: AtomicBool,
}

impl<D> State<D> {
    pub fn new(inner: D) -> State<D> {
        State {
            data: inner,
            visible: AtomicBool::new(false),
        }
    }
}

/// Options controlling how to display the status line
pub struct Options {
    /// How long to wait between subsequent refreshes of the status.
    /// Defaults to 100 ms on interactive terminals (TTYs) and 1 s if the standard error
    /// is not interactive, e.g. redirected to a file.
    pub refresh_period: Duration,

    /// Set it to false if you don't want to show the status on creation of the `StatusLine`.
    pub initially_visible: bool,

    /// Set to true to enable ANSI escape codes.
    /// By default set to true if the standard error is a TTY.
    pub enable_ansi_escapes: bool,
}

impl Default for Options {
    fn default() -> Self {
        let is_tty = is_terminal::is_terminal(std::io::stderr());
        let refresh_period_ms = if is_tty { 100 } else { 1000 };
        Options {
            refresh_period: Duration::from_millis(refresh_period_ms),
            initially_visible: true,
            enable_ansi_escapes: is_tty,
        }
    }
}

/// Wraps arbitrary data and displays it periodically on the screen.
pub struct StatusLine<D: Display> {
    state: Arc<State<D>>,
    options: Options,
}

impl<D: Display + Send + Sync + 'static> StatusLine<D> {
    /// Creates a new `StatusLine` with default options and shows it immediately.
    pub fn new(data: D) -> StatusLine<D> {
        Self::with_options(data, Default::default())
    }

    /// Creates a new `StatusLine` with custom options.
    pub fn with_options(data: D, options: Options) -> StatusLine<D> {
        let state = Arc::new(State::new(data));
        state
            .visible
            .store(options.initially_visible, Ordering::Release);
        let state_ref = state.clone();
        let ansi = options.enable_ansi_escapes;
        let period = options.refresh_period;
        thread::spawn(move || {
            while Arc::strong_count(&state_ref) > 1 {
                if state_ref.visible.load(Ordering::Acquire) {
                    redraw(ansi, &state_ref.data);
                }
                thread::sleep(period);
            }
        });
        StatusLine { state, options }
    }
}

impl<D: Display> StatusLine<D> {
    /// Forces redrawing the status information immediately,
    /// without waiting for the next refresh cycle of the background refresh loop.
    pub fn refresh(&self) {
        redraw(self.options.enable_ansi_escapes, &self.state.data);
    }

    /// Sets the visibility of the status line.
    pub fn set_visible(&self, visible: bool) {
        let was_visible = self.state.visible.swap(visible, Ordering::Release);
        if !visible && was_visible {
            clear(self.options.enable_ansi_escapes)
        } else if visible && !was_visible {
            redraw(self.options.enable_ansi_escapes, &self.state.data)
        }
    }

    /// Returns true if the status line is currently visible.
    pub fn is_visible(&self) -> bool {
        self.state.visible.load(Ordering::Acquire)
    }
}

impl<D: Display> Deref for StatusLine<D> {
    type Target = D;
    fn deref(&self) -> &Self::Target {
        &self.state.data
    }
}

impl<D: Display> Drop for StatusLine<D> {
    fn drop(&mut self) {
        if self.is_visible() {
            clear(self.options.enable_ansi_escapes)
        }
    }
}

struct Row {
    update: StatusUpdate,
    since: Instant,
}

/// One row per status key, in first-seen order.
///
/// Active rows animate a braille spinner; settled rows show ✓, or ✗ when the
/// update carries an error.
pub struct StatusBoard {
    rows: Mutex<IndexMap<String, Row>>,
    started: Instant,
    frame_period: Duration,
}

impl StatusBoard {
    const FRAMES: &'static [&'static str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

    pub fn new() -> Self {
        Self::with_frame_period(Duration::from_millis(100))
    }

    pub fn with_frame_period(frame_period: Duration) -> Self {
        Self {
            rows: Mutex::new(IndexMap::new()),
            started: Instant::now(),
            frame_period: frame_period.max(Duration::from_millis(1)),
        }
    }

    /// Replace the row for `key`, keeping its position.
    pub fn put(&self, key: &str, update: StatusUpdate) {
        let mut rows = self.rows.lock();
        match rows.get_mut(key) {
            Some(row) => {
                if update.active && !row.update.active {
                    row.since = Instant::now();
                }
                row.update = update;
            }
            None => {
                rows.insert(
                    key.to_string(),
                    Row {
                        update,
                        since: Instant::now(),
                    },
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    fn frame(&self) -> &'static str {
        let elapsed = self.started.elapsed().as_millis();
        let period = self.frame_period.as_millis().max(1);
        Self::FRAMES[(elapsed / period) as usize % Self::FRAMES.len()]
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for StatusBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rows = self.rows.lock();
        let frame = self.frame();

        for (index, row) in rows.values().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            let update = &row.update;
            let prefix = update
                .meta
                .prefix
                .as_deref()
                .map(|p| format!("{} ", p.dimmed()))
                .unwrap_or_default();

            if update.active {
                let secs = row.since.elapsed().as_secs_f64();
                write!(f, "{} {prefix}{} {:.1}s", frame.cyan(), update.text, secs)?;
            } else if let Some(error) = &update.meta.error {
                write!(f, "{} {prefix}{}: {}", "✗".red(), update.text, error)?;
            } else {
                write!(f, "{} {prefix}{}", "✓".green(), update.text)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::status::StatusMeta;

    fn plain(board: &StatusBoard) -> String {
        // Strip ANSI colour sequences for comparison
        let text = board.to_string();
        let re = regex::Regex::new(r"\x1b\[[0-9;]*m").unwrap();
        re.replace_all(&text, "").into_owned()
    }

    #[test]
    fn rows_keep_first_seen_order() {
        let board = StatusBoard::new();
        board.put("b", StatusUpdate::settled("second"));
        board.put("a", StatusUpdate::settled("first"));
        board.put("b", StatusUpdate::settled("second again"));

        let text = plain(&board);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines, vec!["✓ second again", "✓ first"]);
    }

    #[test]
    fn errors_and_prefixes_are_rendered() {
        let board = StatusBoard::new();
        board.put(
            "Api/Handler:building",
            StatusUpdate::settled("building").with_meta(StatusMeta {
                prefix: Some("[Api/Handler]".to_string()),
                error: Some("syntax error".to_string()),
            }),
        );

        assert_eq!(plain(&board), "✗ [Api/Handler] building: syntax error");
    }

    #[test]
    fn active_rows_show_a_spinner() {
        let board = StatusBoard::new();
        board.put("synth", StatusUpdate::active("synthesizing"));

        let text = plain(&board);
        assert!(StatusBoard::FRAMES.iter().any(|f| text.starts_with(f)));
        assert!(text.contains("synthesizing"));
        assert_eq!(board.len(), 1);
    }
}
