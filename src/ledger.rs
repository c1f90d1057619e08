//! The migration ledger.
//!
//! A migration is "applied" iff a row with its id exists in the
//! `strata_migrations` table. Rows are inserted when a migration completes
//! forwards and deleted when it is reversed; the engine never stores schema
//! snapshots, only this record of which deltas have run.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

use crate::error::{MigrateError, Result};

/// SQL to create the ledger table (SQLite).
pub const CREATE_LEDGER_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS strata_migrations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    app_name TEXT NOT NULL,
    ran_on TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(app_name, name)
)
"#;

/// A persisted record of one applied migration.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    /// Row id in the ledger table.
    pub id: i64,
    /// Migration id.
    pub name: String,
    /// Application name.
    pub app_name: String,
    /// When the migration completed forwards.
    pub ran_on: DateTime<Utc>,
}

/// Reads and writes the ledger table.
pub struct Ledger {
    pool: SqlitePool,
}

fn parse_ran_on(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            // SQLite datetime('now') format fallback
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|dt| dt.and_utc())
                .unwrap_or_else(|_| Utc::now())
        })
}

impl Ledger {
    /// Creates a new ledger over a pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns true if the ledger table exists. Read-only callers use this
    /// instead of creating the table as a side effect.
    pub async fn exists(&self) -> Result<bool> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'strata_migrations'",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    /// Creates the ledger table if absent. Idempotent.
    pub async fn ensure_table(&self) -> Result<()> {
        sqlx::query(CREATE_LEDGER_TABLE_SQL)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Records a migration as ran.
    pub async fn record_ran(&self, app_name: &str, name: &str) -> Result<()> {
        sqlx::query("INSERT INTO strata_migrations (app_name, name) VALUES (?, ?)")
            .bind(app_name)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Deletes a migration's ledger row (after a successful reversal).
    pub async fn remove_ran(&self, app_name: &str, name: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM strata_migrations WHERE app_name = ? AND name = ?")
            .bind(app_name)
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MigrateError::UnknownMigration {
                app: app_name.to_string(),
                name: name.to_string(),
            });
        }

        Ok(())
    }

    /// Checks whether a migration has run.
    pub async fn has_ran(&self, app_name: &str, name: &str) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM strata_migrations WHERE app_name = ? AND name = ?")
                .bind(app_name)
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// Returns the ids of all migrations that ran for an app.
    pub async fn ran_set(&self, app_name: &str) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM strata_migrations WHERE app_name = ?")
                .bind(app_name)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Returns every ledger entry for an app, oldest first.
    pub async fn ran_for_app(&self, app_name: &str) -> Result<Vec<LedgerEntry>> {
        let rows: Vec<(i64, String, String, String)> = sqlx::query_as(
            "SELECT id, name, app_name, ran_on FROM strata_migrations \
             WHERE app_name = ? ORDER BY id",
        )
        .bind(app_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, app_name, ran_on)| LedgerEntry {
                id,
                name,
                app_name,
                ran_on: parse_ran_on(&ran_on),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_ledger() -> Ledger {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");
        let ledger = Ledger::new(pool);
        ledger.ensure_table().await.unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_ensure_table_is_idempotent() {
        let ledger = create_test_ledger().await;
        ledger.ensure_table().await.unwrap();
        ledger.ensure_table().await.unwrap();
    }

    #[tokio::test]
    async fn test_record_and_check_ran() {
        let ledger = create_test_ledger().await;

        assert!(!ledger.has_ran("music", "0001").await.unwrap());
        ledger.record_ran("music", "0001").await.unwrap();
        assert!(ledger.has_ran("music", "0001").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_ran() {
        let ledger = create_test_ledger().await;

        ledger.record_ran("music", "0001").await.unwrap();
        ledger.remove_ran("music", "0001").await.unwrap();
        assert!(!ledger.has_ran("music", "0001").await.unwrap());

        let result = ledger.remove_ran("music", "0001").await;
        assert!(matches!(
            result,
            Err(MigrateError::UnknownMigration { .. })
        ));
    }

    #[tokio::test]
    async fn test_ran_set_scoped_by_app() {
        let ledger = create_test_ledger().await;

        ledger.record_ran("music", "0001").await.unwrap();
        ledger.record_ran("music", "0002").await.unwrap();
        ledger.record_ran("ticketing", "0001").await.unwrap();

        let music = ledger.ran_set("music").await.unwrap();
        assert_eq!(music.len(), 2);
        assert!(music.contains("0001"));

        let entries = ledger.ran_for_app("music").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "0001");
    }

    #[tokio::test]
    async fn test_exists_does_not_create_the_table() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");
        let ledger = Ledger::new(pool);

        assert!(!ledger.exists().await.unwrap());
        assert!(!ledger.exists().await.unwrap());

        ledger.ensure_table().await.unwrap();
        assert!(ledger.exists().await.unwrap());
    }
}
