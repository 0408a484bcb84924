// ABOUTME: Application-wide error type for stackyard.
// ABOUTME: Collects configuration, storage, service, engine and runtime failures.

use crate::engine::EngineError;
use crate::runtime::RuntimeError;
use crate::service::ServiceError;
use crate::store::{CommandId, StoreError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("command {0} not found")]
    CommandNotFound(CommandId),

    #[error("command {0} cannot be cancelled (it is no longer pending)")]
    NotCancellable(CommandId),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
