//! Schema reconstruction from migration history.
//!
//! Migration files record deltas only, so the shape of a table "as of
//! migration N" is never stored anywhere. This module recovers it with a
//! pure left-fold over the ordered operation log of a manager sequence.
//! The fold is deterministic: the same ordered input always produces the
//! same table set, which is what makes drop reversal reliable.

use crate::error::{MigrateError, Result};
use crate::manager::MigrationManager;
use crate::operations::Operation;
use crate::schema::{ColumnSnapshot, TableSnapshot};

/// Reconstructs table/column state from an ordered prefix of managers.
///
/// Typically constructed with every manager of an app whose id is below
/// some cutoff — for drop reversal, everything strictly before the manager
/// being reversed.
#[derive(Debug)]
pub struct SchemaSnapshot<'a> {
    managers: &'a [MigrationManager],
}

impl<'a> SchemaSnapshot<'a> {
    /// Creates a snapshot over an ordered manager sequence.
    #[must_use]
    pub fn new(managers: &'a [MigrationManager]) -> Self {
        Self { managers }
    }

    /// Folds every manager's operations, in canonical order, into the table
    /// state that would exist after replaying them all.
    ///
    /// Raw hooks have no schema effect and are skipped by construction
    /// (they are not operations).
    pub fn get_snapshot(&self) -> Result<Vec<TableSnapshot>> {
        let mut tables: Vec<(String, TableSnapshot)> = Vec::new();

        for manager in self.managers {
            for operation in manager.canonical_operations() {
                apply_operation(&mut tables, manager.app_name(), &operation)?;
            }
        }

        Ok(tables.into_iter().map(|(_, table)| table).collect())
    }

    /// Looks up a single table in the folded result by class name.
    ///
    /// Callers must not assume a table exists: a missing table means the
    /// recorded history is inconsistent with the request.
    pub fn get_table_from_snapshot(&self, class_name: &str) -> Result<TableSnapshot> {
        self.get_snapshot()?
            .into_iter()
            .find(|table| table.class_name == class_name)
            .ok_or_else(|| {
                MigrateError::Reconstruction(format!(
                    "Table '{class_name}' is not present in the replayed history"
                ))
            })
    }
}

fn find_table<'t>(
    tables: &'t mut [(String, TableSnapshot)],
    app_name: &str,
    class_name: &str,
    tablename: &str,
) -> Option<&'t mut TableSnapshot> {
    tables
        .iter_mut()
        .find(|(app, table)| {
            app == app_name && (table.class_name == class_name || table.tablename == tablename)
        })
        .map(|(_, table)| table)
}

fn apply_operation(
    tables: &mut Vec<(String, TableSnapshot)>,
    app_name: &str,
    operation: &Operation,
) -> Result<()> {
    match operation {
        Operation::AddTable {
            class_name,
            tablename,
            schema_name,
            columns,
        } => {
            if find_table(tables, app_name, class_name, tablename).is_some() {
                return Err(MigrateError::InvalidState(format!(
                    "Table '{class_name}' already exists in app '{app_name}'"
                )));
            }

            let mut table = TableSnapshot::new(class_name.clone(), tablename.clone());
            if let Some(schema) = schema_name {
                table = table.in_schema(schema.clone());
            }
            table.columns = columns.clone();
            tables.push((app_name.to_string(), table));
        }

        Operation::DropTable {
            class_name,
            tablename,
        } => {
            let idx = tables
                .iter()
                .position(|(app, table)| {
                    app == app_name
                        && (table.class_name == *class_name || table.tablename == *tablename)
                })
                .ok_or_else(|| {
                    MigrateError::Reconstruction(format!(
                        "Cannot drop table '{class_name}': never added in prior history"
                    ))
                })?;
            tables.remove(idx);
        }

        Operation::RenameTable {
            old_class_name,
            old_tablename,
            new_class_name,
            new_tablename,
        } => {
            let table = find_table(tables, app_name, old_class_name, old_tablename)
                .ok_or_else(|| {
                    MigrateError::Reconstruction(format!(
                        "Cannot rename table '{old_class_name}': never added in prior history"
                    ))
                })?;
            table.class_name = new_class_name.clone();
            table.tablename = new_tablename.clone();
        }

        Operation::AddColumn {
            table_class_name,
            tablename,
            column,
        } => {
            let table =
                find_table(tables, app_name, table_class_name, tablename).ok_or_else(|| {
                    MigrateError::Reconstruction(format!(
                        "Cannot add column to missing table '{table_class_name}'"
                    ))
                })?;

            if table.get_column(&column.name).is_some() {
                return Err(MigrateError::InvalidState(format!(
                    "Column '{}' already exists in table '{table_class_name}'",
                    column.name
                )));
            }
            table.columns.push(column.clone());
        }

        Operation::DropColumn {
            table_class_name,
            tablename,
            column_name,
        } => {
            let table =
                find_table(tables, app_name, table_class_name, tablename).ok_or_else(|| {
                    MigrateError::Reconstruction(format!(
                        "Cannot drop column from missing table '{table_class_name}'"
                    ))
                })?;

            let idx = table
                .columns
                .iter()
                .position(|c| c.name == *column_name)
                .ok_or_else(|| {
                    MigrateError::Reconstruction(format!(
                        "Cannot drop column '{column_name}': not present in '{table_class_name}'"
                    ))
                })?;
            table.columns.remove(idx);
        }

        Operation::RenameColumn {
            table_class_name,
            tablename,
            old_name,
            new_name,
        } => {
            let table =
                find_table(tables, app_name, table_class_name, tablename).ok_or_else(|| {
                    MigrateError::Reconstruction(format!(
                        "Cannot rename column in missing table '{table_class_name}'"
                    ))
                })?;

            let idx = table
                .columns
                .iter()
                .position(|c| c.name == *old_name)
                .ok_or_else(|| {
                    MigrateError::Reconstruction(format!(
                        "Cannot rename column '{old_name}': not present in '{table_class_name}'"
                    ))
                })?;

            // A rename produces a fresh snapshot under the new name; the
            // original name is not retained.
            let old = table.columns[idx].clone();
            table.columns[idx] = ColumnSnapshot {
                name: new_name.clone(),
                type_tag: old.type_tag,
                params: old.params,
            };
        }

        Operation::AlterColumn {
            table_class_name,
            tablename,
            column_name,
            params,
            ..
        } => {
            let table =
                find_table(tables, app_name, table_class_name, tablename).ok_or_else(|| {
                    MigrateError::Reconstruction(format!(
                        "Cannot alter column in missing table '{table_class_name}'"
                    ))
                })?;

            let column = table.get_column_mut(column_name).ok_or_else(|| {
                MigrateError::Reconstruction(format!(
                    "Cannot alter column '{column_name}': not present in '{table_class_name}'"
                ))
            })?;
            column.params.merge(params);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnType, ParamValue, Params};

    fn add_band(id: &str) -> MigrationManager {
        let mut m = MigrationManager::new(id, "music", "add band table");
        m.add_table(
            "Band",
            "band",
            vec![ColumnSnapshot::new("name", ColumnType::Varchar).length(100)],
        );
        m
    }

    #[test]
    fn test_fold_is_deterministic() {
        let managers = vec![add_band("0001")];
        let first = SchemaSnapshot::new(&managers).get_snapshot().unwrap();
        let second = SchemaSnapshot::new(&managers).get_snapshot().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rename_composition() {
        let m1 = add_band("0001");

        let mut m2 = MigrationManager::new("0002", "music", "rename to title");
        m2.rename_column("Band", "band", "name", "title");

        let mut m3 = MigrationManager::new("0003", "music", "rename to label");
        m3.rename_column("Band", "band", "title", "label");

        let history = vec![m1, m2, m3];

        let after_one = SchemaSnapshot::new(&history[..1])
            .get_table_from_snapshot("Band")
            .unwrap();
        assert_eq!(after_one.columns[0].name, "name");

        let after_two = SchemaSnapshot::new(&history[..2])
            .get_table_from_snapshot("Band")
            .unwrap();
        assert_eq!(after_two.columns[0].name, "title");

        let after_three = SchemaSnapshot::new(&history)
            .get_table_from_snapshot("Band")
            .unwrap();
        assert_eq!(after_three.columns[0].name, "label");
        // Renames replace the snapshot but keep type and parameters.
        assert_eq!(
            after_three.columns[0].params.get("length"),
            Some(&ParamValue::Integer(100))
        );
    }

    #[test]
    fn test_rename_table_updates_both_identities() {
        let m1 = add_band("0001");
        let mut m2 = MigrationManager::new("0002", "music", "rename band");
        m2.rename_table("Band", "band", "Act", "act");

        let history = vec![m1, m2];
        let tables = SchemaSnapshot::new(&history).get_snapshot().unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].class_name, "Act");
        assert_eq!(tables[0].tablename, "act");
    }

    #[test]
    fn test_drop_table_removes_it() {
        let m1 = add_band("0001");
        let mut m2 = MigrationManager::new("0002", "music", "drop band");
        m2.drop_table("Band", "band");

        let history = vec![m1, m2];
        let snapshot = SchemaSnapshot::new(&history);
        assert!(snapshot.get_snapshot().unwrap().is_empty());
        assert!(matches!(
            snapshot.get_table_from_snapshot("Band"),
            Err(MigrateError::Reconstruction(_))
        ));
    }

    #[test]
    fn test_alter_merges_params() {
        let m1 = add_band("0001");
        let mut m2 = MigrationManager::new("0002", "music", "make name unique");
        m2.alter_column(
            "Band",
            "band",
            "name",
            Params::new().with("unique", ParamValue::Bool(true)),
            Params::new().with("unique", ParamValue::Bool(false)),
        );

        let history = vec![m1, m2];
        let band = SchemaSnapshot::new(&history)
            .get_table_from_snapshot("Band")
            .unwrap();
        let name = band.get_column("name").unwrap();
        assert_eq!(name.params.get("unique"), Some(&ParamValue::Bool(true)));
        assert_eq!(name.params.get("length"), Some(&ParamValue::Integer(100)));
    }

    #[test]
    fn test_canonical_order_within_one_manager() {
        // Authored column-first, but the table add must still fold first.
        let mut m = MigrationManager::new("0001", "music", "band with genre");
        m.add_column(
            "Band",
            "band",
            ColumnSnapshot::new("genre", ColumnType::Varchar).length(50),
        );
        m.add_table(
            "Band",
            "band",
            vec![ColumnSnapshot::new("name", ColumnType::Varchar).length(100)],
        );

        let history = vec![m];
        let band = SchemaSnapshot::new(&history)
            .get_table_from_snapshot("Band")
            .unwrap();
        assert_eq!(band.columns.len(), 2);
        assert_eq!(band.columns[1].name, "genre");
    }

    #[test]
    fn test_fold_rejects_duplicate_table() {
        let history = vec![add_band("0001"), add_band("0002")];
        let result = SchemaSnapshot::new(&history).get_snapshot();
        assert!(matches!(result, Err(MigrateError::InvalidState(_))));
    }

    #[test]
    fn test_fold_rejects_operations_on_missing_column() {
        let m1 = add_band("0001");
        let mut m2 = MigrationManager::new("0002", "music", "bad rename");
        m2.rename_column("Band", "band", "label", "title");

        let history = vec![m1, m2];
        let result = SchemaSnapshot::new(&history).get_snapshot();
        assert!(matches!(result, Err(MigrateError::Reconstruction(_))));
    }
}
