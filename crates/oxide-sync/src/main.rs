//! oxide-sync CLI
//!
//! Command-line tool for inspecting a live schema and bringing it in line
//! with a declared one.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_sync::introspect::catalog_for;
use oxide_sync::prelude::*;

/// Connections opened by the CLI pool.
const MAX_CONNECTIONS: u32 = 5;

/// Schema diffing and reversible DDL for MySQL, PostgreSQL and SAP HANA.
#[derive(Parser)]
#[command(name = "oxide-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionSettings,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print live tables as JSON.
    Inspect {
        /// Tables to print (every table in the default namespace if none).
        tables: Vec<String>,
    },

    /// Print the SQL that would bring the database in line.
    Plan {
        /// Declared schema (JSON).
        schema: PathBuf,

        /// Print the rollback SQL instead.
        #[arg(short, long)]
        reverse: bool,
    },

    /// Bring the database in line with a declared schema.
    Sync {
        /// Declared schema (JSON).
        schema: PathBuf,

        /// Show SQL without executing.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let url = &cli.connection.database_url;
    let kind = DialectKind::from_url(url)
        .ok_or_else(|| anyhow!("cannot tell the database family from {url}"))?;
    if kind == DialectKind::Hana {
        bail!("{} has no bundled driver; use the library with a custom connector", kind.as_str());
    }
    let connector = SqlxConnector::connect_url(url, MAX_CONNECTIONS).await?;
    let mut runner = QueryRunner::new(
        Arc::new(connector),
        catalog_for(kind),
        cli.connection.runner_options(),
    );

    let outcome = run(&mut runner, cli.command).await;
    runner.release().await?;
    outcome
}

async fn run(runner: &mut QueryRunner, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Inspect { tables } => {
            let names = if tables.is_empty() {
                runner.table_names().await?
            } else {
                tables
            };
            let tables = runner.get_tables(&names).await?;
            println!("{}", serde_json::to_string_pretty(&tables)?);
        }

        Commands::Plan { schema, reverse } => {
            let declared = load_declared_schema(&schema)?;
            let plan = runner.plan_synchronize(&declared).await?;
            if plan.is_empty() {
                info!("Schema is up to date.");
            } else if reverse {
                print!("{}", plan.down_sql());
            } else {
                print!("{}", plan.up_sql());
            }
        }

        Commands::Sync { schema, dry_run } => {
            let declared = load_declared_schema(&schema)?;
            if dry_run {
                info!("Dry run mode - SQL will be printed but not executed.");
                print!("{}", runner.plan_synchronize(&declared).await?.up_sql());
                return Ok(());
            }
            let diff = runner.synchronize(&declared).await?;
            if diff.is_empty() {
                info!("Schema is up to date.");
            } else {
                info!(
                    created_tables = diff.created_tables.len(),
                    altered_tables = diff.altered_tables.len(),
                    created_views = diff.created_views.len(),
                    "Schema synchronized."
                );
            }
        }
    }
    Ok(())
}
