//! Error types for mysqlite.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for mysqlite operations.
///
/// Every variant is fatal: it aborts the run before a report exists.
/// Failures of individual statements are never raised, they are recorded
/// in the [`ExecutionReport`](crate::engine::ExecutionReport).
#[derive(Debug, Error)]
pub enum Error {
    /// The input script path does not exist.
    #[error("SQL file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// The input script path exists but is not a regular file.
    #[error("Path is not a file: {}", .0.display())]
    NotAFile(PathBuf),

    /// The input script file has zero bytes.
    #[error("SQL file is empty: {}", .0.display())]
    EmptyInput(PathBuf),

    /// The input script could not be read.
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The script handed to the converter contained only whitespace.
    #[error("Empty SQL script provided")]
    EmptyScript,

    /// Splitting produced nothing to execute.
    #[error("No valid SQL commands found in the file")]
    NoStatements,

    /// A stale target database could not be removed.
    #[error("Cannot delete existing database {}. File may be in use. ({source})", .path.display())]
    TargetLocked {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Opening or creating the target database failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The embedded engine failed outside of any single statement.
    #[error("SQLite error: {0}")]
    Transport(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for mysqlite operations.
pub type Result<T> = std::result::Result<T, Error>;
