//! Migration managers.
//!
//! A [`MigrationManager`] is the ordered, identified batch of operations one
//! migration file produces. Operations are replayed in canonical order (table
//! adds, column adds, column renames, column alters, column drops, table
//! renames, table drops, then raw hooks), never in authoring order, so a
//! single migration can add a table and populate its columns in any order in
//! code.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, info};

use crate::dialect::MigrationDialect;
use crate::error::{MigrateError, Result};
use crate::executor::MigrationExecutor;
use crate::operations::Operation;
use crate::schema::{ColumnSnapshot, Params};
use crate::snapshot::SchemaSnapshot;

/// An author-supplied side-effecting hook.
///
/// Every hook is a single asynchronous unit of work; synchronous work is
/// lifted into the contract trivially. Hooks are awaited strictly in turn.
pub type RawHook = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// An ordered, identified batch of operations for one migration.
pub struct MigrationManager {
    id: String,
    app_name: String,
    description: String,
    preview: bool,
    ops: Vec<Operation>,
    raw_forwards: Vec<RawHook>,
    raw_backwards: Vec<RawHook>,
}

impl MigrationManager {
    /// Creates an empty manager.
    ///
    /// `id` must sort lexicographically with the app's other migration ids
    /// (a timestamp from [`new_migration_id`](crate::writer::new_migration_id)
    /// in practice).
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        app_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            app_name: app_name.into(),
            description: description.into(),
            preview: false,
            ops: Vec::new(),
            raw_forwards: Vec::new(),
            raw_backwards: Vec::new(),
        }
    }

    /// Migration id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Owning application.
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Toggles preview mode: statements are rendered but nothing executes
    /// and raw hooks are never invoked.
    pub fn set_preview(&mut self, preview: bool) {
        self.preview = preview;
    }

    /// Whether preview mode is set.
    #[must_use]
    pub fn is_preview(&self) -> bool {
        self.preview
    }

    // Builder methods. All append an operation and return the manager, so
    // calls chain.

    /// Adds a table with the given columns.
    pub fn add_table(
        &mut self,
        class_name: impl Into<String>,
        tablename: impl Into<String>,
        columns: Vec<ColumnSnapshot>,
    ) -> &mut Self {
        self.ops.push(Operation::AddTable {
            class_name: class_name.into(),
            tablename: tablename.into(),
            schema_name: None,
            columns,
        });
        self
    }

    /// Adds a table inside a named schema.
    pub fn add_table_in_schema(
        &mut self,
        class_name: impl Into<String>,
        tablename: impl Into<String>,
        schema_name: impl Into<String>,
        columns: Vec<ColumnSnapshot>,
    ) -> &mut Self {
        self.ops.push(Operation::AddTable {
            class_name: class_name.into(),
            tablename: tablename.into(),
            schema_name: Some(schema_name.into()),
            columns,
        });
        self
    }

    /// Drops a table.
    pub fn drop_table(
        &mut self,
        class_name: impl Into<String>,
        tablename: impl Into<String>,
    ) -> &mut Self {
        self.ops.push(Operation::DropTable {
            class_name: class_name.into(),
            tablename: tablename.into(),
        });
        self
    }

    /// Renames a table.
    pub fn rename_table(
        &mut self,
        old_class_name: impl Into<String>,
        old_tablename: impl Into<String>,
        new_class_name: impl Into<String>,
        new_tablename: impl Into<String>,
    ) -> &mut Self {
        self.ops.push(Operation::RenameTable {
            old_class_name: old_class_name.into(),
            old_tablename: old_tablename.into(),
            new_class_name: new_class_name.into(),
            new_tablename: new_tablename.into(),
        });
        self
    }

    /// Adds a column to an existing table.
    pub fn add_column(
        &mut self,
        table_class_name: impl Into<String>,
        tablename: impl Into<String>,
        column: ColumnSnapshot,
    ) -> &mut Self {
        self.ops.push(Operation::AddColumn {
            table_class_name: table_class_name.into(),
            tablename: tablename.into(),
            column,
        });
        self
    }

    /// Drops a column.
    pub fn drop_column(
        &mut self,
        table_class_name: impl Into<String>,
        tablename: impl Into<String>,
        column_name: impl Into<String>,
    ) -> &mut Self {
        self.ops.push(Operation::DropColumn {
            table_class_name: table_class_name.into(),
            tablename: tablename.into(),
            column_name: column_name.into(),
        });
        self
    }

    /// Renames a column.
    pub fn rename_column(
        &mut self,
        table_class_name: impl Into<String>,
        tablename: impl Into<String>,
        old_name: impl Into<String>,
        new_name: impl Into<String>,
    ) -> &mut Self {
        self.ops.push(Operation::RenameColumn {
            table_class_name: table_class_name.into(),
            tablename: tablename.into(),
            old_name: old_name.into(),
            new_name: new_name.into(),
        });
        self
    }

    /// Replaces column parameters. `old_params` must record the values being
    /// overwritten so the operation can be reversed.
    pub fn alter_column(
        &mut self,
        table_class_name: impl Into<String>,
        tablename: impl Into<String>,
        column_name: impl Into<String>,
        params: Params,
        old_params: Params,
    ) -> &mut Self {
        self.ops.push(Operation::AlterColumn {
            table_class_name: table_class_name.into(),
            tablename: tablename.into(),
            column_name: column_name.into(),
            params,
            old_params,
        });
        self
    }

    /// Registers a forward side-effect hook. Raw hooks run after all
    /// structural operations, outside their transaction.
    pub fn add_raw<F, Fut>(&mut self, hook: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.raw_forwards.push(Arc::new(move || Box::pin(hook())));
        self
    }

    /// Registers the backward counterpart of a raw hook.
    ///
    /// Running backwards with more forward hooks than backward hooks fails
    /// hard rather than silently skipping the missing side effect.
    pub fn add_raw_backwards<F, Fut>(&mut self, hook: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.raw_backwards.push(Arc::new(move || Box::pin(hook())));
        self
    }

    /// Structural operations, in authoring order.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    /// Structural operations, in canonical replay order.
    ///
    /// The sort is stable, so operations within one group keep their
    /// authoring order.
    #[must_use]
    pub fn canonical_operations(&self) -> Vec<Operation> {
        let mut ops = self.ops.clone();
        ops.sort_by_key(Operation::canonical_rank);
        ops
    }

    /// Runs the manager forwards: structural operations in canonical order
    /// inside one transaction, then raw forward hooks, awaited in turn.
    ///
    /// Returns the rendered statements. In preview mode nothing executes and
    /// no hook is invoked. On executor failure partway through, operations
    /// already committed are not rolled back by this layer.
    pub async fn run_forwards<D: MigrationDialect>(
        &self,
        executor: &MigrationExecutor<D>,
    ) -> Result<Vec<String>> {
        let ops = self.canonical_operations();

        if self.preview {
            let mut statements = executor.render(&ops);
            for _ in &self.raw_forwards {
                statements.push("-- raw forwards hook (not rendered in preview)".to_string());
            }
            return Ok(statements);
        }

        info!(app = %self.app_name, id = %self.id, "Running migration forwards");
        let statements = executor.execute(&ops).await?;

        for hook in &self.raw_forwards {
            debug!(app = %self.app_name, id = %self.id, "Awaiting raw forwards hook");
            hook().await?;
        }

        Ok(statements)
    }

    /// Runs the manager backwards: raw backward hooks first, then the
    /// inverse of every structural operation in reverse canonical order.
    ///
    /// `prior` must be the ordered managers of the same app up to, but
    /// excluding, this one: reversing a `DropTable` or `DropColumn` replays
    /// that history to recover the definitions the drop destroyed.
    pub async fn run_backwards<D: MigrationDialect>(
        &self,
        executor: &MigrationExecutor<D>,
        prior: &[MigrationManager],
    ) -> Result<Vec<String>> {
        if self.raw_forwards.len() > self.raw_backwards.len() {
            return Err(MigrateError::MissingBackwardHook(self.id.clone()));
        }

        let inverse_ops = self.inverse_operations(prior)?;

        if self.preview {
            let mut statements: Vec<String> = self
                .raw_backwards
                .iter()
                .map(|_| "-- raw backwards hook (not rendered in preview)".to_string())
                .collect();
            statements.extend(executor.render(&inverse_ops));
            return Ok(statements);
        }

        info!(app = %self.app_name, id = %self.id, "Running migration backwards");

        for hook in &self.raw_backwards {
            debug!(app = %self.app_name, id = %self.id, "Awaiting raw backwards hook");
            hook().await?;
        }

        executor.execute(&inverse_ops).await
    }

    /// Derives the inverse operation list, reconstructing drops from the
    /// snapshot of prior history.
    fn inverse_operations(&self, prior: &[MigrationManager]) -> Result<Vec<Operation>> {
        let ops = self.canonical_operations();

        // Replay prior history only when a drop actually needs it.
        let tables = if ops.iter().any(|op| !op.is_structurally_invertible()) {
            SchemaSnapshot::new(prior).get_snapshot()?
        } else {
            Vec::new()
        };

        let mut inverse = Vec::with_capacity(ops.len());
        for op in ops.iter().rev() {
            if let Some(inverted) = op.invert() {
                inverse.push(inverted);
                continue;
            }

            match op {
                Operation::DropTable {
                    class_name,
                    tablename,
                } => {
                    let table = tables
                        .iter()
                        .find(|t| t.class_name == *class_name || t.tablename == *tablename)
                        .ok_or_else(|| {
                            MigrateError::Reconstruction(format!(
                                "Cannot reverse drop of table '{class_name}': \
                                 not found in prior history"
                            ))
                        })?;
                    inverse.push(Operation::AddTable {
                        class_name: table.class_name.clone(),
                        tablename: table.tablename.clone(),
                        schema_name: Some(table.schema_name.clone()),
                        columns: table.columns.clone(),
                    });
                }
                Operation::DropColumn {
                    table_class_name,
                    tablename,
                    column_name,
                } => {
                    let table = tables
                        .iter()
                        .find(|t| t.class_name == *table_class_name || t.tablename == *tablename)
                        .ok_or_else(|| {
                            MigrateError::Reconstruction(format!(
                                "Cannot reverse drop of column '{column_name}': \
                                 table '{table_class_name}' not found in prior history"
                            ))
                        })?;
                    let column = table.get_column(column_name).ok_or_else(|| {
                        MigrateError::Reconstruction(format!(
                            "Cannot reverse drop of column '{column_name}': \
                             not found in prior history of '{table_class_name}'"
                        ))
                    })?;
                    inverse.push(Operation::AddColumn {
                        table_class_name: table_class_name.clone(),
                        tablename: tablename.clone(),
                        column: column.clone(),
                    });
                }
                _ => unreachable!("only drops lack a structural inverse"),
            }
        }

        Ok(inverse)
    }
}

impl fmt::Debug for MigrationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationManager")
            .field("id", &self.id)
            .field("app_name", &self.app_name)
            .field("description", &self.description)
            .field("preview", &self.preview)
            .field("ops", &self.ops)
            .field("raw_forwards", &self.raw_forwards.len())
            .field("raw_backwards", &self.raw_backwards.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SqliteDialect;
    use crate::schema::{ColumnType, ParamValue};
    use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory SQLite pool")
    }

    async fn table_exists(pool: &SqlitePool, name: &str) -> bool {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
                .bind(name)
                .fetch_optional(pool)
                .await
                .unwrap();
        row.is_some()
    }

    fn add_musician(id: &str) -> MigrationManager {
        let mut m = MigrationManager::new(id, "music", "add musician table");
        m.add_table(
            "Musician",
            "musician",
            vec![ColumnSnapshot::new("name", ColumnType::Varchar)
                .length(100)
                .not_null()],
        );
        m
    }

    #[test]
    fn test_builders_chain_and_group_canonically() {
        let mut m = MigrationManager::new("0001", "music", "mixed authoring order");
        m.drop_column("Band", "band", "genre")
            .add_column(
                "Band",
                "band",
                ColumnSnapshot::new("label", ColumnType::Varchar).length(50),
            )
            .add_table("Band", "band", vec![]);

        let ranks: Vec<u8> = m
            .canonical_operations()
            .iter()
            .map(Operation::canonical_rank)
            .collect();
        assert_eq!(ranks, vec![0, 1, 4]);
    }

    #[tokio::test]
    async fn test_drop_table_round_trip() {
        let pool = create_test_pool().await;
        let executor = MigrationExecutor::new(pool.clone(), SqliteDialect::new());

        let m1 = add_musician("0001");
        let mut m2 = MigrationManager::new("0002", "music", "drop musician");
        m2.drop_table("Musician", "musician");

        m1.run_forwards(&executor).await.unwrap();
        m2.run_forwards(&executor).await.unwrap();
        assert!(!table_exists(&pool, "musician").await);

        // Reversing the drop recreates the table with the columns recovered
        // from the history before the drop.
        let prior = vec![m1];
        m2.run_backwards(&executor, &prior).await.unwrap();
        assert!(table_exists(&pool, "musician").await);

        let columns: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM pragma_table_info('musician')")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(columns, vec![("name".to_string(),)]);
    }

    #[tokio::test]
    async fn test_drop_column_round_trip() {
        let pool = create_test_pool().await;
        let executor = MigrationExecutor::new(pool.clone(), SqliteDialect::new());

        let mut m1 = add_musician("0001");
        m1.add_column(
            "Musician",
            "musician",
            ColumnSnapshot::new("instrument", ColumnType::Varchar).length(50),
        );
        let mut m2 = MigrationManager::new("0002", "music", "drop instrument");
        m2.drop_column("Musician", "musician", "instrument");

        m1.run_forwards(&executor).await.unwrap();
        m2.run_forwards(&executor).await.unwrap();

        let prior = vec![m1];
        m2.run_backwards(&executor, &prior).await.unwrap();

        let columns: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM pragma_table_info('musician')")
                .fetch_all(&pool)
                .await
                .unwrap();
        let names: Vec<&str> = columns.iter().map(|(n,)| n.as_str()).collect();
        assert!(names.contains(&"instrument"));
    }

    #[tokio::test]
    async fn test_alter_unique_round_trip() {
        let pool = create_test_pool().await;
        let executor = MigrationExecutor::new(pool.clone(), SqliteDialect::new());

        let mut m1 = MigrationManager::new("0001", "music", "add band");
        m1.add_table(
            "Band",
            "band",
            vec![ColumnSnapshot::new("name", ColumnType::Varchar).length(100)],
        );
        let mut m2 = MigrationManager::new("0002", "music", "name becomes unique");
        m2.alter_column(
            "Band",
            "band",
            "name",
            Params::new().with("unique", ParamValue::Bool(true)),
            Params::new().with("unique", ParamValue::Bool(false)),
        );

        m1.run_forwards(&executor).await.unwrap();
        m2.run_forwards(&executor).await.unwrap();

        sqlx::query("INSERT INTO \"band\" (name) VALUES ('Pythonistas')")
            .execute(&pool)
            .await
            .unwrap();
        let duplicate = sqlx::query("INSERT INTO \"band\" (name) VALUES ('Pythonistas')")
            .execute(&pool)
            .await;
        assert!(duplicate.is_err());

        // Reversal restores the original constraint.
        let prior = vec![m1];
        m2.run_backwards(&executor, &prior).await.unwrap();
        sqlx::query("INSERT INTO \"band\" (name) VALUES ('Pythonistas')")
            .execute(&pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_preview_has_no_side_effects() {
        let pool = create_test_pool().await;
        let executor = MigrationExecutor::new(pool.clone(), SqliteDialect::new());

        static HOOK_RAN: AtomicBool = AtomicBool::new(false);

        let mut m = add_musician("0001");
        m.add_raw(|| async {
            HOOK_RAN.store(true, Ordering::SeqCst);
            Ok(())
        });
        m.set_preview(true);

        let statements = m.run_forwards(&executor).await.unwrap();
        assert!(statements.iter().any(|s| s.contains("CREATE TABLE")));
        assert!(!table_exists(&pool, "musician").await);
        assert!(!HOOK_RAN.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_raw_hooks_run_in_order() {
        let pool = create_test_pool().await;
        let executor = MigrationExecutor::new(pool, SqliteDialect::new());

        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let mut m = MigrationManager::new("0001", "music", "raw only");
        m.add_raw(|| async {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .add_raw_backwards(|| async {
            CALLS.fetch_add(10, Ordering::SeqCst);
            Ok(())
        });

        m.run_forwards(&executor).await.unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);

        m.run_backwards(&executor, &[]).await.unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 11);
    }

    #[tokio::test]
    async fn test_backwards_requires_paired_raw_hooks() {
        let pool = create_test_pool().await;
        let executor = MigrationExecutor::new(pool, SqliteDialect::new());

        let mut m = MigrationManager::new("0001", "music", "unpaired raw");
        m.add_raw(|| async { Ok(()) });

        let result = m.run_backwards(&executor, &[]).await;
        assert!(matches!(result, Err(MigrateError::MissingBackwardHook(_))));
    }

    #[tokio::test]
    async fn test_backwards_reconstruction_failure_is_surfaced() {
        let pool = create_test_pool().await;
        let executor = MigrationExecutor::new(pool, SqliteDialect::new());

        let mut m = MigrationManager::new("0002", "music", "drop unknown table");
        m.drop_table("Ghost", "ghost");

        // Empty prior history: the drop cannot be reconstructed.
        let result = m.run_backwards(&executor, &[]).await;
        assert!(matches!(result, Err(MigrateError::Reconstruction(_))));
    }
}
