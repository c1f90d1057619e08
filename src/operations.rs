//! Migration operations.
//!
//! A migration records deltas only, never full snapshots. Each structural
//! change is a plain tagged value so that snapshot replay is a single
//! exhaustive match, and so that reversal can be derived without any
//! author-written `backwards()`.

use serde::{Deserialize, Serialize};

use crate::schema::{ColumnSnapshot, Params};

/// One atomic, invertible schema change.
///
/// Raw side-effect hooks are not operations: they are arbitrary async
/// callables and live on the [`MigrationManager`](crate::manager::MigrationManager)
/// directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Create a new table.
    AddTable {
        /// Mapped class name.
        class_name: String,
        /// Database table name.
        tablename: String,
        /// Schema to create the table in (`public` when absent).
        schema_name: Option<String>,
        /// Columns created together with the table.
        columns: Vec<ColumnSnapshot>,
    },

    /// Drop a table. Reversal requires snapshot reconstruction.
    DropTable {
        /// Mapped class name.
        class_name: String,
        /// Database table name.
        tablename: String,
    },

    /// Rename a table, updating both identity axes.
    RenameTable {
        /// Previous class name.
        old_class_name: String,
        /// Previous table name.
        old_tablename: String,
        /// New class name.
        new_class_name: String,
        /// New table name.
        new_tablename: String,
    },

    /// Append a column to a table.
    AddColumn {
        /// Class name of the owning table.
        table_class_name: String,
        /// Table name of the owning table.
        tablename: String,
        /// Column definition.
        column: ColumnSnapshot,
    },

    /// Remove a column. Reversal requires snapshot reconstruction.
    DropColumn {
        /// Class name of the owning table.
        table_class_name: String,
        /// Table name of the owning table.
        tablename: String,
        /// Column to drop.
        column_name: String,
    },

    /// Rename a column.
    RenameColumn {
        /// Class name of the owning table.
        table_class_name: String,
        /// Table name of the owning table.
        tablename: String,
        /// Previous column name.
        old_name: String,
        /// New column name.
        new_name: String,
    },

    /// Replace column parameters. `old_params` records what the new values
    /// overwrote, which is what makes the operation self-inverting.
    AlterColumn {
        /// Class name of the owning table.
        table_class_name: String,
        /// Table name of the owning table.
        tablename: String,
        /// Column being altered.
        column_name: String,
        /// Parameters to apply.
        params: Params,
        /// Parameters as they were before the alter.
        old_params: Params,
    },
}

impl Operation {
    /// Position of this operation's group in canonical replay order.
    ///
    /// Managers replay operations grouped as: table adds, column adds,
    /// column renames, column alters, column drops, table renames, table
    /// drops (raw hooks come after all of these). The grouping guarantees a
    /// table is created before columns are added to it within the same
    /// migration, regardless of authoring order.
    #[must_use]
    pub fn canonical_rank(&self) -> u8 {
        match self {
            Self::AddTable { .. } => 0,
            Self::AddColumn { .. } => 1,
            Self::RenameColumn { .. } => 2,
            Self::AlterColumn { .. } => 3,
            Self::DropColumn { .. } => 4,
            Self::RenameTable { .. } => 5,
            Self::DropTable { .. } => 6,
        }
    }

    /// Returns the inverse operation, when it can be derived structurally.
    ///
    /// `DropTable` and `DropColumn` return `None`: the drop never recorded
    /// what it destroyed, so their inverses must be reconstructed from a
    /// snapshot of prior history by the manager.
    #[must_use]
    pub fn invert(&self) -> Option<Self> {
        match self {
            Self::AddTable {
                class_name,
                tablename,
                ..
            } => Some(Self::DropTable {
                class_name: class_name.clone(),
                tablename: tablename.clone(),
            }),

            Self::DropTable { .. } => None,

            Self::RenameTable {
                old_class_name,
                old_tablename,
                new_class_name,
                new_tablename,
            } => Some(Self::RenameTable {
                old_class_name: new_class_name.clone(),
                old_tablename: new_tablename.clone(),
                new_class_name: old_class_name.clone(),
                new_tablename: old_tablename.clone(),
            }),

            Self::AddColumn {
                table_class_name,
                tablename,
                column,
            } => Some(Self::DropColumn {
                table_class_name: table_class_name.clone(),
                tablename: tablename.clone(),
                column_name: column.name.clone(),
            }),

            Self::DropColumn { .. } => None,

            Self::RenameColumn {
                table_class_name,
                tablename,
                old_name,
                new_name,
            } => Some(Self::RenameColumn {
                table_class_name: table_class_name.clone(),
                tablename: tablename.clone(),
                old_name: new_name.clone(),
                new_name: old_name.clone(),
            }),

            Self::AlterColumn {
                table_class_name,
                tablename,
                column_name,
                params,
                old_params,
            } => Some(Self::AlterColumn {
                table_class_name: table_class_name.clone(),
                tablename: tablename.clone(),
                column_name: column_name.clone(),
                params: old_params.clone(),
                old_params: params.clone(),
            }),
        }
    }

    /// Returns true if the inverse can be derived without a snapshot.
    #[must_use]
    pub fn is_structurally_invertible(&self) -> bool {
        !matches!(self, Self::DropTable { .. } | Self::DropColumn { .. })
    }

    /// Returns a human-readable description of this operation.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::AddTable { tablename, .. } => format!("Add table '{tablename}'"),
            Self::DropTable { tablename, .. } => format!("Drop table '{tablename}'"),
            Self::RenameTable {
                old_tablename,
                new_tablename,
                ..
            } => format!("Rename table '{old_tablename}' to '{new_tablename}'"),
            Self::AddColumn {
                tablename, column, ..
            } => format!("Add column '{}' to table '{tablename}'", column.name),
            Self::DropColumn {
                tablename,
                column_name,
                ..
            } => format!("Drop column '{column_name}' from table '{tablename}'"),
            Self::RenameColumn {
                tablename,
                old_name,
                new_name,
                ..
            } => format!("Rename column '{old_name}' to '{new_name}' in table '{tablename}'"),
            Self::AlterColumn {
                tablename,
                column_name,
                ..
            } => format!("Alter column '{column_name}' in table '{tablename}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    #[test]
    fn test_add_table_inverts_to_drop() {
        let op = Operation::AddTable {
            class_name: "Band".to_string(),
            tablename: "band".to_string(),
            schema_name: None,
            columns: vec![ColumnSnapshot::new("name", ColumnType::Varchar)],
        };

        match op.invert().unwrap() {
            Operation::DropTable {
                class_name,
                tablename,
            } => {
                assert_eq!(class_name, "Band");
                assert_eq!(tablename, "band");
            }
            other => panic!("Expected DropTable, got {other:?}"),
        }
    }

    #[test]
    fn test_rename_table_inverts_by_swapping() {
        let op = Operation::RenameTable {
            old_class_name: "Band".to_string(),
            old_tablename: "band".to_string(),
            new_class_name: "Act".to_string(),
            new_tablename: "act".to_string(),
        };

        match op.invert().unwrap() {
            Operation::RenameTable {
                old_class_name,
                new_class_name,
                ..
            } => {
                assert_eq!(old_class_name, "Act");
                assert_eq!(new_class_name, "Band");
            }
            other => panic!("Expected RenameTable, got {other:?}"),
        }
    }

    #[test]
    fn test_drops_are_not_structurally_invertible() {
        let drop_table = Operation::DropTable {
            class_name: "Band".to_string(),
            tablename: "band".to_string(),
        };
        let drop_column = Operation::DropColumn {
            table_class_name: "Band".to_string(),
            tablename: "band".to_string(),
            column_name: "name".to_string(),
        };

        assert!(drop_table.invert().is_none());
        assert!(drop_column.invert().is_none());
        assert!(!drop_table.is_structurally_invertible());
        assert!(!drop_column.is_structurally_invertible());
    }

    #[test]
    fn test_alter_column_inverts_by_swapping_params() {
        use crate::schema::{ParamValue, Params};

        let op = Operation::AlterColumn {
            table_class_name: "Band".to_string(),
            tablename: "band".to_string(),
            column_name: "name".to_string(),
            params: Params::new().with("unique", ParamValue::Bool(true)),
            old_params: Params::new().with("unique", ParamValue::Bool(false)),
        };

        match op.invert().unwrap() {
            Operation::AlterColumn { params, .. } => {
                assert_eq!(params.get("unique"), Some(&ParamValue::Bool(false)));
            }
            other => panic!("Expected AlterColumn, got {other:?}"),
        }
    }

    #[test]
    fn test_canonical_rank_ordering() {
        let add_table = Operation::AddTable {
            class_name: "Band".to_string(),
            tablename: "band".to_string(),
            schema_name: None,
            columns: vec![],
        };
        let drop_table = Operation::DropTable {
            class_name: "Band".to_string(),
            tablename: "band".to_string(),
        };

        assert!(add_table.canonical_rank() < drop_table.canonical_rank());
    }
}
