//! DDL execution.
//!
//! The executor is the boundary between the engine and the live database: it
//! renders operations through a dialect and executes the statements inside a
//! single transaction per call. SQLite supports transactional DDL, so a
//! failed manager leaves nothing behind; backends without it degrade to
//! best-effort sequential execution — that limitation is surfaced at the
//! dialect, not masked here.

use sqlx::sqlite::SqlitePool;
use tracing::{debug, warn};

use crate::dialect::MigrationDialect;
use crate::error::Result;
use crate::operations::Operation;

/// Renders and executes operations against a database.
pub struct MigrationExecutor<D: MigrationDialect> {
    pool: SqlitePool,
    dialect: D,
}

impl<D: MigrationDialect> MigrationExecutor<D> {
    /// Creates a new executor.
    pub fn new(pool: SqlitePool, dialect: D) -> Self {
        Self { pool, dialect }
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    /// Returns the connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Renders the statements for a list of operations without executing.
    #[must_use]
    pub fn render(&self, operations: &[Operation]) -> Vec<String> {
        operations
            .iter()
            .flat_map(|op| self.dialect.generate_sql(op))
            .collect()
    }

    /// Executes a list of operations inside one transaction.
    ///
    /// Statements rendered as `--` comments mark changes the dialect cannot
    /// express; they are skipped with a warning. Returns the rendered
    /// statements on success.
    pub async fn execute(&self, operations: &[Operation]) -> Result<Vec<String>> {
        let statements = self.render(operations);

        let mut tx = self.pool.begin().await?;
        for sql in &statements {
            if sql.starts_with("--") {
                warn!(comment = %sql, "Skipping comment (unsupported operation)");
                continue;
            }
            debug!(sql = %sql, "Executing DDL");
            sqlx::query(sql).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        Ok(statements)
    }
}
