//! SQLite dialect.
//!
//! SQLite has limited ALTER TABLE support. Uniqueness changes are expressed
//! through a derived unique index so they stay reversible; anything else the
//! backend cannot express is rendered as a comment the executor will skip
//! with a warning.

use crate::operations::Operation;
use crate::schema::{ColumnSnapshot, ColumnType, ParamValue, Params};

use super::MigrationDialect;

/// SQLite migration dialect.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn create_table_sql(&self, tablename: &str, columns: &[ColumnSnapshot]) -> String {
        let mut sql = String::from("CREATE TABLE ");
        sql.push_str(&self.quote_identifier(tablename));
        sql.push_str(" (\n  ");

        let col_defs: Vec<String> = columns.iter().map(|c| self.column_definition(c)).collect();
        sql.push_str(&col_defs.join(",\n  "));
        sql.push_str("\n)");
        sql
    }

    /// Separate index statements for columns carrying `index = true`.
    fn index_statements(&self, tablename: &str, columns: &[ColumnSnapshot]) -> Vec<String> {
        columns
            .iter()
            .filter(|c| c.params.get("index").and_then(ParamValue::as_bool) == Some(true))
            .map(|c| {
                format!(
                    "CREATE INDEX {} ON {} ({})",
                    self.quote_identifier(&format!("idx_{tablename}_{}", c.name)),
                    self.quote_identifier(tablename),
                    self.quote_identifier(&c.name)
                )
            })
            .collect()
    }

    /// Name of the derived index used to toggle uniqueness after creation.
    fn unique_index_name(tablename: &str, column_name: &str) -> String {
        format!("{tablename}_{column_name}_key")
    }

    fn alter_column_sql(&self, tablename: &str, column_name: &str, params: &Params) -> Vec<String> {
        let mut statements = Vec::new();

        for (key, value) in params.iter() {
            match (key, value) {
                ("unique", ParamValue::Bool(true)) => statements.push(format!(
                    "CREATE UNIQUE INDEX {} ON {} ({})",
                    self.quote_identifier(&Self::unique_index_name(tablename, column_name)),
                    self.quote_identifier(tablename),
                    self.quote_identifier(column_name)
                )),
                ("unique", ParamValue::Bool(false)) => statements.push(format!(
                    "DROP INDEX IF EXISTS {}",
                    self.quote_identifier(&Self::unique_index_name(tablename, column_name))
                )),
                ("index", ParamValue::Bool(true)) => statements.push(format!(
                    "CREATE INDEX {} ON {} ({})",
                    self.quote_identifier(&format!("idx_{tablename}_{column_name}")),
                    self.quote_identifier(tablename),
                    self.quote_identifier(column_name)
                )),
                ("index", ParamValue::Bool(false)) => statements.push(format!(
                    "DROP INDEX IF EXISTS {}",
                    self.quote_identifier(&format!("idx_{tablename}_{column_name}"))
                )),
                _ => statements.push(format!(
                    "-- ALTER COLUMN '{key}' not supported in SQLite. \
                     Table recreation required for: {tablename}.{column_name}"
                )),
            }
        }

        statements
    }
}

impl MigrationDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn type_name(&self, type_tag: &ColumnType, _params: &Params) -> String {
        // SQLite ignores length/digits parameters; affinity is all it has.
        match type_tag {
            ColumnType::Varchar
            | ColumnType::Text
            | ColumnType::Timestamp
            | ColumnType::Date
            | ColumnType::Time
            | ColumnType::Json
            | ColumnType::Uuid => "TEXT",
            ColumnType::Integer
            | ColumnType::BigInt
            | ColumnType::SmallInt
            | ColumnType::Boolean
            | ColumnType::ForeignKey => "INTEGER",
            ColumnType::Numeric => "NUMERIC",
            ColumnType::Real | ColumnType::Double => "REAL",
            ColumnType::Bytea => "BLOB",
        }
        .to_string()
    }

    fn generate_sql(&self, operation: &Operation) -> Vec<String> {
        match operation {
            // SQLite has no schemas; schema_name is accepted and ignored.
            Operation::AddTable {
                tablename, columns, ..
            } => {
                let mut statements = vec![self.create_table_sql(tablename, columns)];
                statements.extend(self.index_statements(tablename, columns));
                statements
            }

            Operation::DropTable { tablename, .. } => {
                vec![format!("DROP TABLE {}", self.quote_identifier(tablename))]
            }

            Operation::RenameTable {
                old_tablename,
                new_tablename,
                ..
            } => vec![format!(
                "ALTER TABLE {} RENAME TO {}",
                self.quote_identifier(old_tablename),
                self.quote_identifier(new_tablename)
            )],

            Operation::AddColumn {
                tablename, column, ..
            } => {
                let mut statements = vec![format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    self.quote_identifier(tablename),
                    self.column_definition(column)
                )];
                statements.extend(self.index_statements(tablename, std::slice::from_ref(column)));
                statements
            }

            Operation::DropColumn {
                tablename,
                column_name,
                ..
            } => vec![format!(
                "ALTER TABLE {} DROP COLUMN {}",
                self.quote_identifier(tablename),
                self.quote_identifier(column_name)
            )],

            Operation::RenameColumn {
                tablename,
                old_name,
                new_name,
                ..
            } => vec![format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                self.quote_identifier(tablename),
                self.quote_identifier(old_name),
                self.quote_identifier(new_name)
            )],

            Operation::AlterColumn {
                tablename,
                column_name,
                params,
                ..
            } => self.alter_column_sql(tablename, column_name, params),
        }
    }
}
