//! # mysqlite
//!
//! Load a MySQL script into a fresh SQLite database.
//!
//! The work happens in three steps, each usable on its own:
//!
//! 1. [`convert`] rewrites MySQL-only syntax (`int(11)`, `AUTO_INCREMENT`,
//!    `ENGINE=InnoDB`, `USE db;`, ...) into something SQLite accepts.
//! 2. [`split`] cuts the rewritten script into terminated statements.
//! 3. [`execute`] applies them to a new database file, recording failures
//!    instead of stopping, and commits whatever succeeded.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use mysqlite::prelude::*;
//!
//! let sql = convert("CREATE TABLE t (id int(11) AUTO_INCREMENT);")?;
//! let statements = split(&sql).statements;
//! let report = execute(&statements, Path::new("out.db")).await?;
//! assert!(report.is_success());
//! ```
//!
//! The rewriting is textual. There is no SQL parser behind it, and
//! constructs the rules do not know about pass through untouched.

pub mod config;
pub mod converter;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod splitter;

pub use converter::convert;
pub use engine::execute;
pub use error::{Error, Result};
pub use splitter::split;

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::converter::{convert, rules, RewriteRule};
    pub use crate::engine::{
        execute, ErrorCategory, ExecutionEngine, ExecutionReport, StatementFailure,
        StatementOutcome,
    };
    pub use crate::error::Error;
    pub use crate::pipeline::{preview, Pipeline, RunState};
    pub use crate::splitter::{split, Split, Statement};
}
