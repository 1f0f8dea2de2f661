//! Line-oriented statement splitting.
//!
//! The splitter is not lexical: a `;` or a comment marker inside a string
//! literal is treated like any other.

use std::fmt;

use serde::Serialize;
use tracing::warn;

/// Markers that turn a whole line into a comment.
pub const COMMENT_MARKERS: [&str; 2] = ["--", "#"];

/// A complete, terminated SQL statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Statement(String);

impl Statement {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this statement creates a table, temporary ones included.
    pub fn is_create_table(&self) -> bool {
        let mut words = self.words();
        if !words.next().is_some_and(|w| w.eq_ignore_ascii_case("create")) {
            return false;
        }
        let word = match words.next() {
            Some(w) if w.eq_ignore_ascii_case("temp") || w.eq_ignore_ascii_case("temporary") => {
                words.next()
            }
            other => other,
        };
        word.is_some_and(|w| w.eq_ignore_ascii_case("table"))
    }

    /// Whether this statement opens or closes a transaction.
    pub fn is_transaction_control(&self) -> bool {
        let mut words = self.words();
        match words.next() {
            Some(w) if w.eq_ignore_ascii_case("start") => {
                words.next().is_some_and(|w| w.eq_ignore_ascii_case("transaction"))
            }
            Some(w) => ["begin", "commit", "end", "rollback"]
                .iter()
                .any(|k| w.eq_ignore_ascii_case(k)),
            None => false,
        }
    }

    fn words(&self) -> impl Iterator<Item = &str> {
        self.0
            .split_whitespace()
            .map(|w| w.trim_end_matches(';'))
            .filter(|w| !w.is_empty())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Statement {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The result of splitting a script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Split {
    pub statements: Vec<Statement>,
    /// Trailing text that never reached a terminator.
    pub incomplete: Option<String>,
}

/// Split rewritten SQL into statements.
///
/// Lines are trimmed, blank and comment lines are skipped, and the rest are
/// joined with single spaces until a line ends with `;`. Trailing text
/// without a terminator is logged and left out of the statements.
pub fn split(text: &str) -> Split {
    let text = text.replace("\r\n", "\n");
    let mut statements = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        let line = line.trim();
        if line.is_empty() || is_comment(line) {
            continue;
        }

        pending.push(line);

        if line.ends_with(';') {
            let joined = pending.join(" ");
            if !joined.trim_matches(|c| c == ';' || c == ' ').is_empty() {
                statements.push(Statement(joined));
            }
            pending.clear();
        }
    }

    let incomplete = Some(pending.join(" ")).filter(|rest| !rest.trim().is_empty());
    if let Some(rest) = &incomplete {
        warn!(statement = %rest, "found incomplete SQL command");
    }

    Split {
        statements,
        incomplete,
    }
}

fn is_comment(line: &str) -> bool {
    COMMENT_MARKERS.iter().any(|m| line.starts_with(m))
}
