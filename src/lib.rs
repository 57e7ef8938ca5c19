//! Fast development loop for CDK-managed Node.js Lambda functions.
//!
//! Reads the watch manifest produced at synth time, resolves each selected
//! entry to its deployed function, and runs one watch session per function:
//! source edits trigger an optional type-check compile, an incremental
//! esbuild rebuild and a direct code upload, with bursts of edits coalesced
//! into a single follow-up cycle.

pub mod aws;
pub mod build;
pub mod cli;
pub mod config;
pub mod io;
pub mod logging;
pub mod manifest;
pub mod project;
pub mod session;
pub mod synth;
pub mod watcher;

pub use config::Settings;
pub use manifest::{LambdaEntry, Manifest};
