//! Terminal output: exit codes and the status surface.

pub mod exit_code;
pub mod status;
pub mod status_line;

pub use exit_code::ExitCode;
pub use status::{RecordingStatus, StatusMeta, StatusSink, StatusUpdate, TerminalStatus};
pub use status_line::{Options as StatusLineOptions, StatusBoard, StatusLine};
