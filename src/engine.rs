//! SQLite execution engine for mysqlite.
//!
//! Applies statements in order over a single sqlx connection. Statement
//! failures are classified and recorded; everything that succeeded is
//! committed in one transaction once the whole batch has been attempted.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode};
use sqlx::{ConnectOptions, Connection, Executor};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::splitter::Statement;

const SKIPPED_TRANSACTION_CONTROL: &str = "transaction control statement skipped";

/// Coarse classification of a statement-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    Syntax,
    MissingTable,
    ForeignKey,
    /// `BEGIN`, `COMMIT`, `ROLLBACK` and friends, which are never executed.
    TransactionControl,
    Unclassified,
}

impl ErrorCategory {
    /// Classify a raw engine message by substring, first match wins.
    pub fn classify(message: &str) -> Self {
        let message = message.to_lowercase();
        if message.contains("syntax error") {
            Self::Syntax
        } else if message.contains("no such table") {
            Self::MissingTable
        } else if message.contains("foreign key") {
            Self::ForeignKey
        } else {
            Self::Unclassified
        }
    }

    /// Remediation hint, if the category has one.
    pub fn hint(self) -> Option<&'static str> {
        match self {
            Self::Syntax => {
                Some("This appears to be a syntax error. Check the SQL command format.")
            }
            Self::MissingTable => {
                Some("Referenced table doesn't exist. Check table creation order.")
            }
            Self::ForeignKey => {
                Some("Foreign key constraint failed. Check referenced table and key.")
            }
            Self::TransactionControl => {
                Some("Transaction control is handled by the loader; statement was skipped.")
            }
            Self::Unclassified => None,
        }
    }
}

/// A statement the engine rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementFailure {
    /// 1-based position in the batch.
    pub index: usize,
    pub statement: Statement,
    /// The engine's message, unmodified.
    pub error: String,
    pub category: ErrorCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

impl StatementFailure {
    fn new(index: usize, statement: &Statement, error: &str) -> Self {
        Self::with_category(index, statement, error, ErrorCategory::classify(error))
    }

    fn skipped(index: usize, statement: &Statement) -> Self {
        Self::with_category(
            index,
            statement,
            SKIPPED_TRANSACTION_CONTROL,
            ErrorCategory::TransactionControl,
        )
    }

    fn with_category(index: usize, statement: &Statement, error: &str, category: ErrorCategory) -> Self {
        Self {
            index,
            statement: statement.clone(),
            error: error.to_string(),
            category,
            hint: category.hint(),
        }
    }
}

/// What happened to one statement, reported as it happens.
#[derive(Debug, Clone, Copy)]
pub enum StatementOutcome<'a> {
    Succeeded {
        index: usize,
        total: usize,
        statement: &'a Statement,
    },
    Failed {
        total: usize,
        failure: &'a StatementFailure,
    },
}

impl<'a> StatementOutcome<'a> {
    pub fn statement(&self) -> &'a Statement {
        match *self {
            Self::Succeeded { statement, .. } => statement,
            Self::Failed { failure, .. } => &failure.statement,
        }
    }

    /// Size of the batch this statement belongs to.
    pub fn total(&self) -> usize {
        match *self {
            Self::Succeeded { total, .. } | Self::Failed { total, .. } => total,
        }
    }
}

/// Counters and failures for one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionReport {
    total: usize,
    succeeded: usize,
    failed: usize,
    success: bool,
    failures: Vec<StatementFailure>,
}

impl ExecutionReport {
    fn new(total: usize) -> Self {
        Self {
            total,
            success: true,
            ..Self::default()
        }
    }

    fn record_success(&mut self) {
        self.succeeded += 1;
    }

    fn record_failure(&mut self, failure: StatementFailure) {
        self.failed += 1;
        self.success = false;
        self.failures.push(failure);
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn failures(&self) -> &[StatementFailure] {
        &self.failures
    }

    /// True only when no statement failed.
    pub fn is_success(&self) -> bool {
        self.success
    }
}

/// Exclusive owner of the target database connection for one run.
///
/// Dropping the engine closes the connection and rolls back anything not
/// yet committed.
pub struct ExecutionEngine {
    conn: SqliteConnection,
    target: PathBuf,
}

impl ExecutionEngine {
    /// Delete any stale file at `target`, then create a fresh database with
    /// foreign key enforcement switched on.
    pub async fn open(target: &Path) -> Result<Self> {
        remove_stale(target)?;

        let conn = SqliteConnectOptions::new()
            .filename(target)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete)
            .foreign_keys(true)
            .connect()
            .await
            .map_err(|e| Error::Connection(format!("{}: {}", target.display(), e)))?;

        debug!(path = %target.display(), "opened database");
        Ok(Self {
            conn,
            target: target.to_path_buf(),
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Apply every statement in order and commit the ones that succeeded.
    ///
    /// `observe` sees each outcome right after the statement ran. Only
    /// failures outside a single statement are returned as errors, and
    /// then nothing is committed.
    ///
    /// The batch owns its transaction, so transaction control statements
    /// in the script are recorded as failures without being executed.
    pub async fn run<F>(&mut self, statements: &[Statement], mut observe: F) -> Result<ExecutionReport>
    where
        F: FnMut(StatementOutcome<'_>),
    {
        let total = statements.len();
        let mut report = ExecutionReport::new(total);

        (&mut self.conn).execute("BEGIN").await.map_err(transport)?;

        for (i, statement) in statements.iter().enumerate() {
            let index = i + 1;
            if statement.is_transaction_control() {
                let failure = StatementFailure::skipped(index, statement);
                debug!(index, statement = %statement, "skipped transaction control statement");
                observe(StatementOutcome::Failed {
                    total,
                    failure: &failure,
                });
                report.record_failure(failure);
                continue;
            }

            match (&mut self.conn).execute(statement.as_str()).await {
                Ok(_) => {
                    report.record_success();
                    observe(StatementOutcome::Succeeded {
                        index,
                        total,
                        statement,
                    });
                }
                Err(sqlx::Error::Database(err)) => {
                    let failure = StatementFailure::new(index, statement, err.message());
                    debug!(index, category = ?failure.category, error = %failure.error, "statement failed");
                    observe(StatementOutcome::Failed {
                        total,
                        failure: &failure,
                    });
                    report.record_failure(failure);
                }
                Err(e) => return Err(transport(e)),
            }
        }

        (&mut self.conn).execute("COMMIT").await.map_err(transport)?;
        info!(
            total = report.total(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "batch committed"
        );
        Ok(report)
    }

    /// Close the connection gracefully.
    pub async fn close(self) -> Result<()> {
        self.conn.close().await.map_err(transport)?;
        debug!(path = %self.target.display(), "closed database");
        Ok(())
    }
}

/// Create `target` from scratch and apply `statements` to it.
pub async fn execute(statements: &[Statement], target: &Path) -> Result<ExecutionReport> {
    let mut engine = ExecutionEngine::open(target).await?;
    let report = engine.run(statements, |_| {}).await?;
    engine.close().await?;
    Ok(report)
}

/// Files SQLite keeps next to a database, by suffix.
const SIDE_FILES: [&str; 3] = ["-journal", "-wal", "-shm"];

/// Delete the target and any journal files a previous run left beside it.
fn remove_stale(target: &Path) -> Result<()> {
    let side_files = SIDE_FILES.iter().map(|suffix| {
        let mut name = target.as_os_str().to_os_string();
        name.push(suffix);
        PathBuf::from(name)
    });

    for path in std::iter::once(target.to_path_buf()).chain(side_files) {
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed stale file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => return Err(Error::TargetLocked { path, source }),
        }
    }
    Ok(())
}

fn transport(e: sqlx::Error) -> Error {
    Error::Transport(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::split;
    use pretty_assertions::assert_eq;
    use sqlx::Row;

    #[test]
    fn test_classify() {
        assert_eq!(
            ErrorCategory::classify("near \"TABEL\": syntax error"),
            ErrorCategory::Syntax
        );
        assert_eq!(
            ErrorCategory::classify("no such table: ward"),
            ErrorCategory::MissingTable
        );
        assert_eq!(
            ErrorCategory::classify("FOREIGN KEY constraint failed"),
            ErrorCategory::ForeignKey
        );
        assert_eq!(
            ErrorCategory::classify("UNIQUE constraint failed: t.id"),
            ErrorCategory::Unclassified
        );
        assert_eq!(
            ErrorCategory::classify("cannot commit - no transaction is active"),
            ErrorCategory::Unclassified
        );
        assert_eq!(ErrorCategory::Unclassified.hint(), None);
        assert!(ErrorCategory::TransactionControl.hint().is_some());
        assert!(ErrorCategory::MissingTable.hint().unwrap().contains("creation order"));
    }

    #[tokio::test]
    async fn test_partial_commit() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("partial.db");
        let statements = split(
            "CREATE TABLE t (id INTEGER PRIMARY KEY);\n\
             INSERT INTO missing VALUES (1);\n\
             INSERT INTO t VALUES (7);\n",
        )
        .statements;

        let mut seen = Vec::new();
        let mut engine = ExecutionEngine::open(&target).await.unwrap();
        let report = engine
            .run(&statements, |outcome| {
                seen.push((
                    matches!(outcome, StatementOutcome::Succeeded { .. }),
                    outcome.total(),
                ))
            })
            .await
            .unwrap();
        engine.close().await.unwrap();

        assert_eq!(seen, vec![(true, 3), (false, 3), (true, 3)]);
        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_success());

        let failure = &report.failures()[0];
        assert_eq!(failure.index, 2);
        assert_eq!(failure.statement.as_str(), "INSERT INTO missing VALUES (1);");
        assert_eq!(failure.category, ErrorCategory::MissingTable);
        assert!(failure.hint.is_some());

        let mut conn = SqliteConnectOptions::new()
            .filename(&target)
            .connect()
            .await
            .unwrap();
        let row = sqlx::query("SELECT COUNT(*) AS n FROM t WHERE id = 7")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!(row.get::<i64, _>("n"), 1);
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let statements = split(
            "CREATE TABLE ward (id INTEGER PRIMARY KEY);\n\
             CREATE TABLE bed (id INTEGER, ward_id INTEGER REFERENCES ward(id));\n\
             INSERT INTO bed VALUES (1, 99);\n",
        )
        .statements;

        let report = execute(&statements, &dir.path().join("fk.db")).await.unwrap();
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures()[0].category, ErrorCategory::ForeignKey);
    }

    #[tokio::test]
    async fn test_script_rollback_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("rollback.db");
        let statements = split(
            "CREATE TABLE t (id INTEGER);\nINSERT INTO t VALUES (1);\nROLLBACK;\n",
        )
        .statements;

        let report = execute(&statements, &target).await.unwrap();
        assert!(!report.is_success());
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);

        let failure = &report.failures()[0];
        assert_eq!(failure.index, 3);
        assert_eq!(failure.category, ErrorCategory::TransactionControl);
        assert_eq!(failure.error, "transaction control statement skipped");

        let mut conn = SqliteConnectOptions::new()
            .filename(&target)
            .connect()
            .await
            .unwrap();
        let row = sqlx::query("SELECT COUNT(*) AS n FROM t")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!(row.get::<i64, _>("n"), 1);
    }

    #[tokio::test]
    async fn test_script_commit_does_not_end_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let statements = split(
            "START TRANSACTION;\nCREATE TABLE t (id INTEGER);\nCOMMIT;\nINSERT INTO t VALUES (1);\n",
        )
        .statements;

        let report = execute(&statements, &dir.path().join("commit.db")).await.unwrap();
        assert_eq!(report.succeeded(), 2);
        let skipped: Vec<usize> = report.failures().iter().map(|f| f.index).collect();
        assert_eq!(skipped, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_stale_target_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("stale.db");
        std::fs::write(&target, b"not a database").unwrap();

        let statements = split("CREATE TABLE t (id INTEGER);\n").statements;
        let report = execute(&statements, &target).await.unwrap();
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_stale_journal_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("stale.db");
        let journal = dir.path().join("stale.db-journal");
        let wal = dir.path().join("stale.db-wal");
        std::fs::write(&target, b"not a database").unwrap();
        std::fs::write(&journal, b"not a journal").unwrap();
        std::fs::write(&wal, b"not a wal").unwrap();

        let engine = ExecutionEngine::open(&target).await.unwrap();
        assert!(!wal.exists());
        engine.close().await.unwrap();
        assert!(!journal.exists());
    }

    #[tokio::test]
    async fn test_undeletable_target_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let statements = split("SELECT 1;\n").statements;

        let err = execute(&statements, dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::TargetLocked { .. }));
    }
}
