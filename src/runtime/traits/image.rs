// ABOUTME: Image operations trait for container runtimes.
// ABOUTME: Pull images and check whether they exist locally.

use super::sealed::Sealed;
use crate::types::ImageRef;
use async_trait::async_trait;

#[async_trait]
pub trait ImageOps: Sealed + Send + Sync {
    /// Pull an image, returning once the pull has fully completed.
    async fn pull_image(&self, reference: &ImageRef) -> Result<(), ImageError>;

    /// Check if an image exists locally.
    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("pull failed: {0}")]
    PullFailed(String),

    #[error("pull of {image} timed out after {timeout:?}")]
    Timeout {
        image: String,
        timeout: std::time::Duration,
    },

    #[error("runtime error: {0}")]
    Runtime(String),
}
