//! Watch handlers.

mod session;

pub use session::SessionFileHandler;
