//! Scaffolding for new migration files.

use chrono::Utc;

/// Returns a fresh migration id.
///
/// Ids are ISO-like timestamps with microsecond precision, so they sort
/// lexicographically in creation order.
#[must_use]
pub fn new_migration_id() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S:%6f").to_string()
}

/// Returns the file name for a scaffolded migration.
#[must_use]
pub fn migration_file_name(app_name: &str, id: &str) -> String {
    let stamp: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{app_name}_{stamp}.rs")
}

/// Generates the source of a new migration module.
pub struct MigrationScaffold {
    app_name: String,
    id: String,
}

impl MigrationScaffold {
    /// Creates a scaffold for an app and id.
    #[must_use]
    pub fn new(app_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            id: id.into(),
        }
    }

    /// Renders the migration source.
    #[must_use]
    pub fn generate(&self) -> String {
        format!(
            r#"//! Migration for the '{app}' app.

use strata::prelude::*;

pub const ID: &str = "{id}";
pub const DESCRIPTION: &str = "";

/// Registers this migration. Add it to the app's `AppConfig`.
pub fn module() -> MigrationModule {{
    MigrationModule::new(ID, || async {{
        let mut manager = MigrationManager::new(ID, "{app}", DESCRIPTION);

        // Record the schema changes here, e.g.:
        // manager.add_table(
        //     "Band",
        //     "band",
        //     vec![ColumnSnapshot::new("name", ColumnType::Varchar).length(100)],
        // );
        let _ = &mut manager;

        Ok(manager)
    }})
    .description(DESCRIPTION)
}}
"#,
            app = self.app_name,
            id = self.id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_sort_in_creation_order() {
        let first = new_migration_id();
        let second = new_migration_id();
        assert!(second >= first);
    }

    #[test]
    fn test_file_name_is_sanitized() {
        let name = migration_file_name("music", "2024-01-26T12:05:19:563571");
        assert_eq!(name, "music_2024_01_26T12_05_19_563571.rs");
    }

    #[test]
    fn test_scaffold_mentions_id_and_app() {
        let code = MigrationScaffold::new("music", "2024-01-26T12:05:19:563571").generate();
        assert!(code.contains("pub const ID: &str = \"2024-01-26T12:05:19:563571\""));
        assert!(code.contains("MigrationManager::new(ID, \"music\""));
    }

    #[test]
    fn test_scaffold_writes_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let id = new_migration_id();
        let path = dir.path().join(migration_file_name("music", &id));

        std::fs::write(&path, MigrationScaffold::new("music", &id).generate()).unwrap();
        assert!(path.exists());
    }
}
