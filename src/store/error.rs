// ABOUTME: Storage error type shared by the memory and SQLite stores.
// ABOUTME: Wraps sqlx and migration failures and reports conflicts by name.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("stack already exists: {0}")]
    StackExists(String),

    #[error("stack not found: {0}")]
    StackNotFound(String),

    #[error("version {version} already exists for stack {stack_id}")]
    VersionExists { stack_id: String, version: String },

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
