//! The migration runner.
//!
//! Drives discovery, ordering and execution: migrations across apps run in
//! a topological sort of declared dependencies, ascending by id within an
//! app, strictly sequentially. The ledger decides what is pending; reversal
//! refuses to undo a migration out of turn.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use tracing::info;

use crate::dialect::MigrationDialect;
use crate::error::{MigrateError, Result};
use crate::executor::MigrationExecutor;
use crate::ledger::Ledger;
use crate::manager::MigrationManager;
use crate::registry::MigrationRegistry;

/// Sentinel target meaning "every migration".
pub const TARGET_ALL: &str = "all";

/// What one migration run produced.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    /// Application name.
    pub app_name: String,
    /// Migration id.
    pub name: String,
    /// Statements rendered (and, outside preview, executed).
    pub statements: Vec<String>,
}

/// Discovered-vs-applied status of one migration, for read-only listings.
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Application name.
    pub app_name: String,
    /// Migration id.
    pub name: String,
    /// Whether a ledger row exists for it.
    pub applied: bool,
    /// When the migration completed forwards, if it did.
    pub applied_on: Option<DateTime<Utc>>,
}

/// Discovers, orders and executes migrations, keeping the ledger in sync.
pub struct MigrationRunner<D: MigrationDialect> {
    registry: MigrationRegistry,
    executor: MigrationExecutor<D>,
    ledger: Ledger,
}

impl<D: MigrationDialect> MigrationRunner<D> {
    /// Creates a runner over a pool, dialect and registry.
    pub fn new(pool: SqlitePool, dialect: D, registry: MigrationRegistry) -> Self {
        let ledger = Ledger::new(pool.clone());
        Self {
            registry,
            executor: MigrationExecutor::new(pool, dialect),
            ledger,
        }
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    /// Returns the ledger.
    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Creates the ledger table if absent. Call once per session before
    /// running anything; the runner never creates it implicitly.
    pub async fn ensure_ledger(&self) -> Result<()> {
        self.ledger.ensure_table().await
    }

    /// Builds every manager for an app and its transitive dependencies:
    /// dependency apps first, ascending id within each app.
    ///
    /// Each manager's id and app are validated against its registration,
    /// since a mismatch would corrupt the ledger.
    pub async fn discover(&self, app_name: &str) -> Result<Vec<MigrationManager>> {
        let mut managers = Vec::new();

        for app in self.registry.resolution_order(app_name)? {
            for module in app.sorted_migrations() {
                let manager = module.forwards().await?;
                if manager.id() != module.name() || manager.app_name() != app.app_name() {
                    return Err(MigrateError::Discovery(format!(
                        "Migration '{}/{}' built a manager identified as '{}/{}'",
                        app.app_name(),
                        module.name(),
                        manager.app_name(),
                        manager.id(),
                    )));
                }
                managers.push(manager);
            }
        }

        Ok(managers)
    }

    /// Returns the ids of migrations recorded as ran for an app.
    pub async fn get_migrations_which_ran(&self, app_name: &str) -> Result<HashSet<String>> {
        self.ledger.ran_set(app_name).await
    }

    /// Runs pending migrations forwards.
    ///
    /// `target` is [`TARGET_ALL`] or a migration id of `app_name`, which
    /// bounds that app's run inclusively (dependency apps still run to
    /// completion). Running with nothing pending is a no-op. A ledger row
    /// is inserted after each success; nothing is recorded in preview mode.
    pub async fn forwards(
        &self,
        app_name: &str,
        target: &str,
        preview: bool,
    ) -> Result<Vec<MigrationReport>> {
        let managers = self.discover(app_name).await?;

        if target != TARGET_ALL
            && !managers
                .iter()
                .any(|m| m.app_name() == app_name && m.id() == target)
        {
            return Err(MigrateError::UnknownMigration {
                app: app_name.to_string(),
                name: target.to_string(),
            });
        }

        let mut reports = Vec::new();
        for mut manager in managers {
            if manager.app_name() == app_name && target != TARGET_ALL && manager.id() > target {
                continue;
            }
            if self.ledger.has_ran(manager.app_name(), manager.id()).await? {
                continue;
            }

            manager.set_preview(preview);
            let statements = manager.run_forwards(&self.executor).await?;

            if !preview {
                self.ledger
                    .record_ran(manager.app_name(), manager.id())
                    .await?;
                info!(app = %manager.app_name(), id = %manager.id(), "Migration ran forwards");
            }

            reports.push(MigrationReport {
                app_name: manager.app_name().to_string(),
                name: manager.id().to_string(),
                statements,
            });
        }

        if reports.is_empty() {
            info!(app = %app_name, "No pending migrations");
        }

        Ok(reports)
    }

    /// Reverses migrations back to, and including, `target`.
    ///
    /// `target` must be [`TARGET_ALL`] or a known migration id of
    /// `app_name`. Every id from the target to the most recent must be
    /// present in the ledger before any reversal begins — skip-undoing an
    /// older migration while a newer one remains applied is refused without
    /// mutating anything. Reversal runs newest first, deleting each ledger
    /// row on success and stopping on the first failure.
    pub async fn backwards(
        &self,
        app_name: &str,
        target: &str,
        preview: bool,
    ) -> Result<Vec<MigrationReport>> {
        // Only the named app is ever reversed; dependency apps keep their
        // migrations, since dependents may still rely on them.
        let mut own: Vec<MigrationManager> = self
            .discover(app_name)
            .await?
            .into_iter()
            .filter(|m| m.app_name() == app_name)
            .collect();

        let start = if target == TARGET_ALL {
            0
        } else {
            own.iter().position(|m| m.id() == target).ok_or_else(|| {
                MigrateError::UnknownMigration {
                    app: app_name.to_string(),
                    name: target.to_string(),
                }
            })?
        };

        let ran = self.ledger.ran_set(app_name).await?;
        for manager in &own[start..] {
            if !ran.contains(manager.id()) {
                return Err(MigrateError::OutOfOrderReversal {
                    app: app_name.to_string(),
                    name: manager.id().to_string(),
                });
            }
        }

        for manager in own[start..].iter_mut() {
            manager.set_preview(preview);
        }

        let mut reports = Vec::new();
        for i in (start..own.len()).rev() {
            let (prior, rest) = own.split_at(i);
            let manager = &rest[0];

            let statements = manager.run_backwards(&self.executor, prior).await?;

            if !preview {
                self.ledger.remove_ran(app_name, manager.id()).await?;
                info!(app = %app_name, id = %manager.id(), "Migration reversed");
            }

            reports.push(MigrationReport {
                app_name: app_name.to_string(),
                name: manager.id().to_string(),
                statements,
            });
        }

        Ok(reports)
    }

    /// Read-only listing of every registered migration, whether it ran and
    /// when. A missing ledger table means nothing has been applied; it is
    /// not created here.
    pub async fn check(&self) -> Result<Vec<MigrationStatus>> {
        let ledger_exists = self.ledger.exists().await?;

        let mut statuses = Vec::new();
        for app in self.registry.apps() {
            let entries = if ledger_exists {
                self.ledger.ran_for_app(app.app_name()).await?
            } else {
                Vec::new()
            };

            for module in app.sorted_migrations() {
                let applied_on = entries
                    .iter()
                    .find(|entry| entry.name == module.name())
                    .map(|entry| entry.ran_on);
                statuses.push(MigrationStatus {
                    app_name: app.app_name().to_string(),
                    name: module.name().to_string(),
                    applied: applied_on.is_some(),
                    applied_on,
                });
            }
        }
        Ok(statuses)
    }
}
