// ABOUTME: Client-facing operations: enqueue intents, query commands, manage versions.
// ABOUTME: Everything here only touches the stores; the worker does the runtime work.

mod commands;
mod versions;

pub use commands::{CommandService, DEFAULT_PAGE_SIZE, DeployRequest};
pub use versions::{NewVersion, VersionService, canonical_json, content_hash};

use crate::stack::SpecError;
use crate::store::StoreError;
use crate::types::NameError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("stack not found: {0}")]
    StackNotFound(String),

    #[error("version {version} not found for stack {stack_id}")]
    VersionNotFound { stack_id: String, version: String },

    #[error("version body is required")]
    MissingBody,

    #[error("invalid version body: {0}")]
    InvalidBody(#[from] SpecError),

    #[error("invalid stack id: {0}")]
    InvalidName(#[from] NameError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
