//! TypeScript project awareness: tsconfig chains and local import graphs.

mod dependencies;
mod error;
mod tsconfig;

pub use dependencies::{DependencyScanner, VENDOR_DIR, is_vendored};
pub use error::{TsConfigError, TsConfigResult};
pub use tsconfig::{
    EXCLUDED_COMPILER_OPTIONS, PathAliasResolver, PathRule, TsConfig, compiler_flags,
    flatten_compiler_options, load_chain, parse_tsconfig, pre_compilation_flags, read_tsconfig,
    resolve_extends,
};
