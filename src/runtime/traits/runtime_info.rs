// ABOUTME: Runtime info trait for container runtimes.
// ABOUTME: Query runtime version and check connectivity.

use super::sealed::Sealed;
use super::shared_types::RuntimeMetadata;
use async_trait::async_trait;

#[async_trait]
pub trait RuntimeInfo: Sealed + Send + Sync {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError>;

    /// Ping the runtime to check connectivity.
    async fn ping(&self) -> Result<(), RuntimeInfoError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeInfoError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
