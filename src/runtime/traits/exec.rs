// ABOUTME: Exec operations trait for container runtimes.
// ABOUTME: Run a command inside a running container and collect its output.

use super::sealed::Sealed;
use super::shared_types::{ExecConfig, ExecResult};
use crate::types::ContainerId;
use async_trait::async_trait;

#[async_trait]
pub trait ExecOps: Sealed + Send + Sync {
    /// Run a command to completion and return its exit code and output.
    async fn exec(&self, container: &ContainerId, config: &ExecConfig)
    -> Result<ExecResult, ExecError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("container not running: {0}")]
    ContainerNotRunning(String),

    #[error("exec timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("exec failed: {0}")]
    Failed(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
