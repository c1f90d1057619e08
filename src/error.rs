//! Error types for the migration engine.

/// Errors that can occur while discovering, replaying or executing migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// An app or migration module could not be resolved from the registry.
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// App dependencies form a cycle.
    #[error("Circular dependency detected between apps")]
    CircularDependency,

    /// A requested migration id is not among the discovered migrations.
    #[error("Unknown migration: {app}/{name}")]
    UnknownMigration {
        /// Application name.
        app: String,
        /// Migration id.
        name: String,
    },

    /// A reversal was requested while a more recent migration in the same
    /// app has not run, or part of the reversal slice never ran.
    #[error("Cannot reverse {app}/{name}: the full slice back to the target must have run")]
    OutOfOrderReversal {
        /// Application name.
        app: String,
        /// Migration id blocking the reversal.
        name: String,
    },

    /// Snapshot replay could not find the table or column a drop reversal
    /// needs to reconstruct. The recorded history is inconsistent.
    #[error("Reconstruction failed: {0}")]
    Reconstruction(String),

    /// Replaying the operation log produced an impossible state
    /// (e.g. adding a table that already exists).
    #[error("Invalid migration state: {0}")]
    InvalidState(String),

    /// A manager with raw forward hooks was run backwards without a paired
    /// backward hook for each of them.
    #[error("Migration '{0}' has raw forward hooks without paired backward hooks")]
    MissingBackwardHook(String),

    /// An author-supplied raw hook failed.
    #[error("Raw hook failed: {0}")]
    Hook(String),

    /// Database error during DDL or ledger execution.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (writing scaffolded migration files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
