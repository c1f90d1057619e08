//! Command-line surface.
//!
//! The binary is a thin wrapper: projects embed [`run_with`] in their own
//! `main`, passing the registry their migration modules were registered
//! into, and get `new` / `forwards` / `backwards` / `check` for free.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

use crate::dialect::SqliteDialect;
use crate::error::{MigrateError, Result};
use crate::registry::MigrationRegistry;
use crate::runner::{MigrationRunner, TARGET_ALL};
use crate::writer::{migration_file_name, new_migration_id, MigrationScaffold};

/// Reversible schema migrations.
#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    pub database: String,

    /// Directory scaffolded migration files are written to.
    #[arg(short, long, default_value = "migrations")]
    pub migrations_dir: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Scaffold a new migration file for an app.
    New {
        /// App to create the migration for.
        app_name: String,
    },

    /// Run pending migrations forwards.
    Forwards {
        /// App to migrate.
        app_name: String,

        /// Run up to and including this migration id ("all" for everything).
        #[arg(long, default_value = TARGET_ALL)]
        migration_id: String,

        /// Render the DDL without executing or touching the ledger.
        #[arg(long)]
        preview: bool,
    },

    /// Reverse migrations back to a target id.
    Backwards {
        /// App to reverse.
        app_name: String,

        /// Reverse back to and including this id ("all" for everything).
        migration_id: String,

        /// Render the DDL without executing or touching the ledger.
        #[arg(long)]
        preview: bool,
    },

    /// List discovered vs applied migrations (read-only).
    Check,
}

/// Runs a parsed CLI against a registry.
pub async fn run_with(cli: Cli, registry: MigrationRegistry) -> Result<()> {
    if let Commands::New { app_name } = &cli.command {
        // Scaffolding needs no database connection.
        if registry.get(app_name).is_none() {
            return Err(MigrateError::Discovery(format!(
                "App '{app_name}' is not registered"
            )));
        }

        let id = new_migration_id();
        let path = cli.migrations_dir.join(migration_file_name(app_name, &id));
        std::fs::create_dir_all(&cli.migrations_dir)?;
        std::fs::write(&path, MigrationScaffold::new(app_name, &id).generate())?;
        info!(path = %path.display(), "Created migration");
        return Ok(());
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&cli.database)
        .await?;
    let runner = MigrationRunner::new(pool, SqliteDialect::new(), registry);
    // `check` is read-only and must not create the ledger table.
    if !matches!(cli.command, Commands::Check) {
        runner.ensure_ledger().await?;
    }

    match cli.command {
        Commands::New { .. } => unreachable!("handled above"),

        Commands::Forwards {
            app_name,
            migration_id,
            preview,
        } => {
            let reports = runner.forwards(&app_name, &migration_id, preview).await?;
            report(&reports, preview, "ran forwards");
        }

        Commands::Backwards {
            app_name,
            migration_id,
            preview,
        } => {
            let reports = runner.backwards(&app_name, &migration_id, preview).await?;
            report(&reports, preview, "reversed");
        }

        Commands::Check => {
            let statuses = runner.check().await?;
            if statuses.is_empty() {
                println!("No migrations registered.");
            }
            for status in statuses {
                let mark = if status.applied { "X" } else { " " };
                match status.applied_on {
                    Some(ran_on) => println!(
                        " [{mark}] {}/{} (applied {})",
                        status.app_name,
                        status.name,
                        ran_on.format("%Y-%m-%d %H:%M:%S")
                    ),
                    None => println!(" [{mark}] {}/{}", status.app_name, status.name),
                }
            }
        }
    }

    Ok(())
}

fn report(reports: &[crate::runner::MigrationReport], preview: bool, verb: &str) {
    if reports.is_empty() {
        println!("Nothing to do.");
        return;
    }
    for r in reports {
        if preview {
            println!("-- {}/{}", r.app_name, r.name);
            for sql in &r.statements {
                println!("{sql};");
            }
        } else {
            println!("{}/{} {verb}", r.app_name, r.name);
        }
    }
}
