//! End-to-end run: validate, connect, convert, split, execute, close.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::Config;
use crate::converter::convert;
use crate::engine::{ExecutionEngine, ExecutionReport, StatementOutcome};
use crate::error::{Error, Result};
use crate::splitter::{split, Split};

/// Where a run currently is. `Closed` is reached on every path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Uninitialized,
    Validated,
    Connected,
    Converting,
    Splitting,
    Executing,
    Committed,
    Closed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Uninitialized => "uninitialized",
            RunState::Validated => "validated",
            RunState::Connected => "connected",
            RunState::Converting => "converting",
            RunState::Splitting => "splitting",
            RunState::Executing => "executing",
            RunState::Committed => "committed",
            RunState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One load of a MySQL script into a fresh SQLite file.
#[derive(Debug)]
pub struct Pipeline {
    input: PathBuf,
    target: PathBuf,
    state: RunState,
}

impl Pipeline {
    pub fn new(input: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            target: target.into(),
            state: RunState::Uninitialized,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.input, &config.target)
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run the whole load and return the report.
    ///
    /// The target is only touched after the input passed validation. Any
    /// error leaves the pipeline `Closed` with the connection released.
    pub async fn run<F>(&mut self, observe: F) -> Result<ExecutionReport>
    where
        F: FnMut(StatementOutcome<'_>),
    {
        let result = self.drive(observe).await;
        self.enter(RunState::Closed);
        result
    }

    async fn drive<F>(&mut self, observe: F) -> Result<ExecutionReport>
    where
        F: FnMut(StatementOutcome<'_>),
    {
        validate_input(&self.input)?;
        self.enter(RunState::Validated);

        let mut engine = ExecutionEngine::open(&self.target).await?;
        self.enter(RunState::Connected);

        let script = read_script(&self.input)?;

        self.enter(RunState::Converting);
        let sql = convert(&script)?;

        self.enter(RunState::Splitting);
        let Split { statements, .. } = split(&sql);
        if statements.is_empty() {
            return Err(Error::NoStatements);
        }

        self.enter(RunState::Executing);
        let report = engine.run(&statements, observe).await?;
        self.enter(RunState::Committed);

        engine.close().await?;
        Ok(report)
    }

    fn enter(&mut self, next: RunState) {
        debug!(from = %self.state, to = %next, "run state");
        self.state = next;
    }
}

/// Convert and split a script without touching any database.
pub fn preview(input: &Path) -> Result<Split> {
    validate_input(input)?;
    let script = read_script(input)?;
    Ok(split(&convert(&script)?))
}

/// The input must be an existing, non-empty regular file.
pub fn validate_input(path: &Path) -> Result<()> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::InputNotFound(path.to_path_buf()));
        }
        Err(source) => {
            return Err(Error::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if !metadata.is_file() {
        return Err(Error::NotAFile(path.to_path_buf()));
    }
    if metadata.len() == 0 {
        return Err(Error::EmptyInput(path.to_path_buf()));
    }
    Ok(())
}

fn read_script(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}
