//! Database dialect implementations.
//!
//! A dialect translates abstract operations into the concrete statements a
//! backend understands. The engine only depends on this trait; everything
//! past it (connection handling, wire protocol) is somebody else's problem.

mod sqlite;

pub use sqlite::SqliteDialect;

use crate::operations::Operation;
use crate::schema::{ColumnSnapshot, ColumnType, ParamValue, Params};

/// Trait for backend-specific DDL generation.
///
/// A statement may be rendered as a `--` comment when the backend cannot
/// express the change; the executor skips comments with a warning instead of
/// masking the limitation.
pub trait MigrationDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Generates the statements for one operation.
    fn generate_sql(&self, operation: &Operation) -> Vec<String>;

    /// Returns the type name for a column, given its parameters.
    fn type_name(&self, type_tag: &ColumnType, params: &Params) -> String;

    /// Renders a full column definition.
    fn column_definition(&self, column: &ColumnSnapshot) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.type_name(&column.type_tag, &column.params),
        ];

        if column.params.get("null").and_then(ParamValue::as_bool) == Some(false) {
            parts.push("NOT NULL".to_string());
        }

        if column.params.get("unique").and_then(ParamValue::as_bool) == Some(true) {
            parts.push("UNIQUE".to_string());
        }

        if let Some(default) = column.params.get("default") {
            parts.push(format!("DEFAULT {}", default.to_sql()));
        }

        if let Some(ParamValue::Text(references)) = column.params.get("references") {
            parts.push(format!("REFERENCES {}", self.quote_identifier(references)));
        }

        parts.join(" ")
    }

    /// Quotes an identifier (table name, column name, index name).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{name}\"")
    }
}
