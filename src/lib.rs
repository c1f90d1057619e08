//! Reversible, replayable schema migrations for Rust.
//!
//! `strata` is an event-sourced migration engine: migration files record
//! deltas only (add a column, rename a table), never full snapshots. The
//! table state at any point in history is recovered by folding the ordered
//! operation log, which is also how reversal recreates what a drop
//! destroyed — without any author-written `backwards()`.
//!
//! # Architecture
//!
//! - **Operations** — atomic, invertible schema changes (`AddTable`,
//!   `DropColumn`, `RenameTable`, ...)
//! - **MigrationManager** — one migration's ordered batch of operations,
//!   replayed in canonical order and run forwards or backwards
//! - **SchemaSnapshot** — pure fold reconstructing table state from an
//!   ordered prefix of managers
//! - **MigrationRunner** — discovery over an explicit registry,
//!   dependency ordering, and the persisted ledger of applied migrations
//! - **Dialect / Executor** — backend-specific DDL generation and
//!   transactional execution
//!
//! # Example
//!
//! ```rust,ignore
//! use strata::prelude::*;
//!
//! fn music_app() -> AppConfig {
//!     AppConfig::new("music").migration(MigrationModule::new(
//!         "2024-01-26T12:05:19:563571",
//!         || async {
//!             let mut manager = MigrationManager::new(
//!                 "2024-01-26T12:05:19:563571",
//!                 "music",
//!                 "add the band table",
//!             );
//!             manager.add_table(
//!                 "Band",
//!                 "band",
//!                 vec![ColumnSnapshot::new("name", ColumnType::Varchar)
//!                     .length(100)
//!                     .unique()],
//!             );
//!             Ok(manager)
//!         },
//!     ))
//! }
//!
//! let mut registry = MigrationRegistry::new();
//! registry.register(music_app())?;
//!
//! let runner = MigrationRunner::new(pool, SqliteDialect::new(), registry);
//! runner.ensure_ledger().await?;
//! runner.forwards("music", "all", false).await?;
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Scaffold a migration file with a fresh sortable id
//! strata new music
//!
//! # Run pending migrations
//! strata forwards music
//!
//! # Reverse back to (and including) a migration
//! strata backwards music 2024-01-26T12:05:19:563571
//!
//! # List discovered vs applied migrations
//! strata check
//! ```

pub mod cli;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod manager;
pub mod operations;
pub mod registry;
pub mod runner;
pub mod schema;
pub mod snapshot;
pub mod writer;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::dialect::{MigrationDialect, SqliteDialect};
    pub use crate::error::{MigrateError, Result};
    pub use crate::executor::MigrationExecutor;
    pub use crate::ledger::{Ledger, LedgerEntry};
    pub use crate::manager::{MigrationManager, RawHook};
    pub use crate::operations::Operation;
    pub use crate::registry::{AppConfig, MigrationModule, MigrationRegistry};
    pub use crate::runner::{MigrationReport, MigrationRunner, MigrationStatus, TARGET_ALL};
    pub use crate::schema::{ColumnSnapshot, ColumnType, ParamValue, Params, TableSnapshot};
    pub use crate::snapshot::SchemaSnapshot;
    pub use crate::writer::{new_migration_id, MigrationScaffold};
}
