//! The migration registry.
//!
//! Migration modules register themselves here at startup: an app with its
//! declared dependencies, and one entry per migration carrying the sortable
//! id and an async `forwards()` entry point that builds the manager. The
//! runner operates over this in-memory registry — there is no filesystem or
//! module introspection at run time.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::{MigrateError, Result};
use crate::manager::MigrationManager;

type BoxedForwards = Arc<dyn Fn() -> BoxFuture<'static, Result<MigrationManager>> + Send + Sync>;

/// One registered migration: an id plus the entry point producing its
/// manager. Reversal is derived from the manager's recorded operations, so
/// there is no `backwards` entry point.
#[derive(Clone)]
pub struct MigrationModule {
    name: String,
    description: Option<String>,
    forwards: BoxedForwards,
}

impl MigrationModule {
    /// Registers a migration entry point under a sortable id.
    pub fn new<F, Fut>(name: impl Into<String>, forwards: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<MigrationManager>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            forwards: Arc::new(move || Box::pin(forwards())),
        }
    }

    /// Attaches a description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The migration id.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds this migration's manager.
    pub async fn forwards(&self) -> Result<MigrationManager> {
        (self.forwards)().await
    }
}

impl fmt::Debug for MigrationModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationModule")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// One application's migrations and its dependencies on other apps.
#[derive(Debug, Clone)]
pub struct AppConfig {
    app_name: String,
    dependencies: Vec<String>,
    migrations: Vec<MigrationModule>,
}

impl AppConfig {
    /// Creates an app config.
    #[must_use]
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            dependencies: Vec::new(),
            migrations: Vec::new(),
        }
    }

    /// Declares that another app's migrations must run before this app's.
    #[must_use]
    pub fn depends_on(mut self, app_name: impl Into<String>) -> Self {
        self.dependencies.push(app_name.into());
        self
    }

    /// Registers a migration module.
    #[must_use]
    pub fn migration(mut self, module: MigrationModule) -> Self {
        self.migrations.push(module);
        self
    }

    /// The app name.
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Declared dependency app names.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Registered migrations, ascending by id.
    #[must_use]
    pub fn sorted_migrations(&self) -> Vec<&MigrationModule> {
        let mut modules: Vec<&MigrationModule> = self.migrations.iter().collect();
        modules.sort_by(|a, b| a.name.cmp(&b.name));
        modules
    }
}

/// The in-memory registry of every app known to the engine.
#[derive(Debug, Default)]
pub struct MigrationRegistry {
    apps: Vec<AppConfig>,
}

impl MigrationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an app. Each app must be registered exactly once; a second
    /// registration under the same name is refused rather than shadowed.
    pub fn register(&mut self, app: AppConfig) -> Result<()> {
        if self.get(app.app_name()).is_some() {
            return Err(MigrateError::Discovery(format!(
                "App '{}' is already registered",
                app.app_name()
            )));
        }
        self.apps.push(app);
        Ok(())
    }

    /// All registered apps, in registration order.
    #[must_use]
    pub fn apps(&self) -> &[AppConfig] {
        &self.apps
    }

    /// Looks up an app by name.
    #[must_use]
    pub fn get(&self, app_name: &str) -> Option<&AppConfig> {
        self.apps.iter().find(|a| a.app_name == app_name)
    }

    /// Returns `app_name` and its transitive dependencies in topological
    /// order (dependencies first), deduplicated preserving first-seen order.
    pub fn resolution_order(&self, app_name: &str) -> Result<Vec<&AppConfig>> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut in_progress = HashSet::new();
        self.visit(app_name, &mut order, &mut visited, &mut in_progress)?;
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        app_name: &str,
        order: &mut Vec<&'a AppConfig>,
        visited: &mut HashSet<String>,
        in_progress: &mut HashSet<String>,
    ) -> Result<()> {
        if visited.contains(app_name) {
            return Ok(());
        }
        if !in_progress.insert(app_name.to_string()) {
            return Err(MigrateError::CircularDependency);
        }

        let app = self.get(app_name).ok_or_else(|| {
            MigrateError::Discovery(format!("App '{app_name}' is not registered"))
        })?;

        for dependency in &app.dependencies {
            self.visit(dependency, order, visited, in_progress)?;
        }

        in_progress.remove(app_name);
        visited.insert(app_name.to_string());
        order.push(app);
        Ok(())
    }
}
