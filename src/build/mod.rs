//! Bundling and pre-compilation of function code.

mod command;
mod error;
mod esbuild;
mod options;
mod tsc;

pub use command::ToolCommand;
pub use error::{BuildError, BuildResult};
pub use esbuild::{BuildHandle, Bundler, ContextHandle, EsbuildBundler};
pub use options::{BuildPlan, EntryPoints, EsbuildOptions, OUTPUT_FILE, PlannedEntry, js_sibling};
pub use tsc::{TscCompiler, TypeCompiler};
