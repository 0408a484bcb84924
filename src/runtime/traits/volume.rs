// ABOUTME: Volume operations trait for container runtimes.
// ABOUTME: Named volumes backing stack service mounts.

use super::sealed::Sealed;
use super::shared_types::VolumeConfig;
use async_trait::async_trait;

#[async_trait]
pub trait VolumeOps: Sealed + Send + Sync {
    async fn volume_exists(&self, name: &str) -> Result<bool, VolumeError>;

    async fn create_volume(&self, config: &VolumeConfig) -> Result<(), VolumeError>;

    async fn remove_volume(&self, name: &str, force: bool) -> Result<(), VolumeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum VolumeError {
    #[error("volume not found: {0}")]
    NotFound(String),

    #[error("volume in use, cannot remove: {0}")]
    InUse(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
