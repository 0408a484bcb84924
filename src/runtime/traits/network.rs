// ABOUTME: Network operations trait for container runtimes.
// ABOUTME: Create, look up and remove the per-stack bridge network.

use super::sealed::Sealed;
use super::shared_types::NetworkConfig;
use crate::types::NetworkId;
use async_trait::async_trait;

#[async_trait]
pub trait NetworkOps: Sealed + Send + Sync {
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError>;

    async fn remove_network(&self, id: &NetworkId) -> Result<(), NetworkError>;

    /// Look up a network by name.
    async fn find_network(&self, name: &str) -> Result<Option<NetworkId>, NetworkError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("network not found: {0}")]
    NotFound(String),

    #[error("network already exists: {0}")]
    AlreadyExists(String),

    #[error("network in use, cannot remove: {0}")]
    InUse(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
