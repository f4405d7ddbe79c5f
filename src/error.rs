//! Error taxonomy for the diff application engine.
//!
//! Only whole-pipeline failures are represented here. Per-hunk problems
//! (low-confidence matches, subprocess hiccups) never escape as `Err`; they
//! are folded into an [`crate::result::ApplicationResult`] instead. See
//! `§7 Error Handling Design` for the propagation policy this mirrors.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal, whole-call errors. Each variant maps onto one of the `kind`
/// strings in the JSON result schema (`parse_error`, `missing_file`,
/// `write_error`).
#[derive(Error, Debug)]
pub enum EngineError {
    /// The diff text could not be parsed. Carries the offending line for
    /// diagnostics.
    #[error("failed to parse diff near line {line}: {message}")]
    Parse { line: usize, message: String },

    /// The target file does not exist and the diff is not a new-file diff.
    #[error("target file not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// A patch attempted to write outside the configured codebase root.
    #[error("path '{}' resolves outside the target directory", .0.display())]
    PathTraversal(PathBuf),

    /// Writing the patched content back to disk failed.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other I/O failure (reading the target file, canonicalizing
    /// paths, creating parent directories).
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// The `kind` string used in the JSON error payload (§6).
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Parse { .. } => "parse_error",
            EngineError::MissingFile(_) => "missing_file",
            EngineError::PathTraversal(_) => "path_traversal",
            EngineError::Write { .. } => "write_error",
            EngineError::Io { .. } => "io_error",
        }
    }
}
