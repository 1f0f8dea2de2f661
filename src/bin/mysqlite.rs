//! mysqlite — load a MySQL script into SQLite
//!
//! # Usage
//!
//! ```bash
//! # hospital.sql -> hospital.db
//! mysqlite
//!
//! # Explicit paths, echoing every CREATE TABLE
//! mysqlite dump.sql --target clinic.db --echo-ddl
//!
//! # Show the converted statements only
//! mysqlite dump.sql --dry-run
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use colored::*;
use mysqlite::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mysqlite")]
#[command(version)]
#[command(about = "Load a MySQL script into a fresh SQLite database", long_about = None)]
#[command(after_help = "EXAMPLES:
    mysqlite
    mysqlite hospital.sql --target hospital.db
    mysqlite dump.sql --dry-run
    mysqlite dump.sql --format json > report.json")]
struct Cli {
    /// MySQL script to load [default: hospital.sql]
    #[arg(env = "MYSQLITE_INPUT")]
    input: Option<PathBuf>,

    /// SQLite database to create; an existing file is replaced [default: hospital.db]
    #[arg(short, long, env = "MYSQLITE_TARGET")]
    target: Option<PathBuf>,

    /// Config file (defaults to ./mysqlite.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print each converted CREATE TABLE statement as it runs
    #[arg(long)]
    echo_ddl: bool,

    /// Don't execute, just show the converted statements
    #[arg(short, long)]
    dry_run: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli).await {
        eprintln!("\n{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "mysqlite=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(cli: &Cli) -> Result<Config, Error> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(input) = &cli.input {
        config.input = input.clone();
    }
    if let Some(target) = &cli.target {
        config.target = target.clone();
    }
    config.echo_ddl |= cli.echo_ddl;
    Ok(config)
}

async fn run(cli: &Cli) -> Result<(), Error> {
    let config = resolve_config(cli)?;

    if cli.verbose {
        println!("{} {}", "Input:".dimmed(), config.input.display().to_string().yellow());
        println!("{} {}", "Target:".dimmed(), config.target.display().to_string().yellow());
    }

    if cli.dry_run {
        show_preview(&config, cli.format)?;
        return Ok(());
    }

    let json = cli.format == OutputFormat::Json;
    let echo_ddl = config.echo_ddl && !json;
    let mut pipeline = Pipeline::from_config(&config);

    let report = pipeline
        .run(|outcome| {
            if json {
                return;
            }
            if echo_ddl && outcome.statement().is_create_table() {
                println!("{} {}", "DDL:".cyan(), outcome.statement().as_str().white());
            }
            if let StatementOutcome::Failed { total, failure } = outcome {
                print_failure(failure, total);
            }
        })
        .await?;

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
        }
        OutputFormat::Table => print_summary(&report),
    }
    Ok(())
}

fn print_failure(failure: &StatementFailure, total: usize) {
    println!(
        "\n{} {}/{}:",
        "Error executing command".red().bold(),
        failure.index,
        total
    );
    println!("{} {}", "Command:".dimmed(), failure.statement.as_str());
    println!("{} {}", "Error:".dimmed(), failure.error.red());
    if let Some(hint) = failure.hint {
        println!("{} {}", "Hint:".yellow(), hint);
    }
}

fn print_summary(report: &ExecutionReport) {
    println!();
    println!("{}", "Database creation completed:".green().bold());
    println!("- Total commands: {}", report.total().to_string().cyan());
    println!("- Successful commands: {}", report.succeeded().to_string().green());
    println!("- Failed commands: {}", report.failed().to_string().red());
    println!();

    if report.is_success() {
        println!("{} Database created successfully!", "✓".green());
    } else {
        println!("{}", "⚠ Warning: Database created with some errors.".yellow());
    }
}

fn show_preview(config: &Config, format: OutputFormat) -> Result<(), Error> {
    let split = preview(&config.input)?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&split.statements).unwrap_or_default()
            );
        }
        OutputFormat::Table => {
            println!("{}", "🔍 DRY-RUN MODE - Converted SQL:".yellow().bold());
            for (i, statement) in split.statements.iter().enumerate() {
                println!("\n{}{}:", "Statement ".dimmed(), (i + 1).to_string().cyan());
                println!("  {}", statement.as_str().white());
            }
            if let Some(rest) = &split.incomplete {
                println!();
                println!("{} {}", "⚠ Incomplete SQL command:".yellow(), rest);
            }
            println!("\n{}", "No changes made.".yellow());
        }
    }
    Ok(())
}
