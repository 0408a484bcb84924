// ABOUTME: Errors raised while executing a command.
// ABOUTME: Each maps to a kind whose name is the fallback failure message.

use crate::runtime::{ContainerError, ExecError, ImageError, LogError, NetworkError, VolumeError};
use crate::stack::{CycleError, SpecError};
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The payload is missing a field or holds a bad value.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Dispatch(String),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Logs(#[from] LogError),

    #[error("command in service {service} exited with code {exit_code}")]
    ExitCode { service: String, exit_code: i64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    Validation,
    NotFound,
    Dispatch,
    Spec,
    Runtime,
    Store,
}

impl EngineErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineErrorKind::Validation => "ValidationError",
            EngineErrorKind::NotFound => "NotFoundError",
            EngineErrorKind::Dispatch => "DispatchError",
            EngineErrorKind::Spec => "SpecError",
            EngineErrorKind::Runtime => "RuntimeError",
            EngineErrorKind::Store => "StoreError",
        }
    }
}

impl EngineError {
    pub fn kind(&self) -> EngineErrorKind {
        match self {
            EngineError::Validation(_) => EngineErrorKind::Validation,
            EngineError::NotFound(_) => EngineErrorKind::NotFound,
            EngineError::Dispatch(_) => EngineErrorKind::Dispatch,
            EngineError::Spec(_) | EngineError::Cycle(_) => EngineErrorKind::Spec,
            EngineError::Image(_)
            | EngineError::Container(_)
            | EngineError::Network(_)
            | EngineError::Volume(_)
            | EngineError::Exec(_)
            | EngineError::Logs(_)
            | EngineError::ExitCode { .. } => EngineErrorKind::Runtime,
            EngineError::Store(_) => EngineErrorKind::Store,
        }
    }
}
