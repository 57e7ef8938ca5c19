//! Error types for tsconfig handling.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TsConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Failed to parse {path}: {reason}\nSuggestion: Check JSON syntax, comments, and trailing commas"
    )]
    Parse { path: PathBuf, reason: String },

    #[error(
        "Circular extends chain detected: {path}\nSuggestion: Remove circular references in tsconfig extends"
    )]
    CircularExtends { path: PathBuf },

    #[error("Cannot resolve extends '{extends}' from {from}")]
    UnresolvedExtends { extends: String, from: PathBuf },

    #[error("Missing support for compilerOption: [{key}]: {{ {kind}, {value} }}")]
    UnsupportedOption {
        key: String,
        kind: &'static str,
        value: String,
    },

    #[error(
        "Invalid path pattern '{pattern}': {reason}\nSuggestion: Check tsconfig path patterns for valid syntax"
    )]
    InvalidPathPattern { pattern: String, reason: String },
}

pub type TsConfigResult<T> = Result<T, TsConfigError>;
