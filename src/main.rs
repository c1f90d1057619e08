//! strata CLI
//!
//! Standalone binary for driving migrations. Projects with their own
//! migration modules embed `strata::cli::run_with` in their `main` and pass
//! the registry those modules were registered into; this binary runs with an
//! empty registry, which still serves `check` and surfaces the CLI.

use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use strata::cli::{run_with, Cli};
use strata::registry::MigrationRegistry;

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

    if let Err(error) = run_with(cli, MigrationRegistry::new()).await {
        eprintln!("{error}");
        std::process::exit(1);
    }

    Ok(())
}
