// ABOUTME: Container operations trait for container runtimes.
// ABOUTME: Create, start, stop, remove, inspect, list and look up containers by name.

use super::sealed::Sealed;
use super::shared_types::{ContainerConfig, ContainerInfo, ContainerState};
use crate::types::ContainerId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Container lifecycle operations.
#[async_trait]
pub trait ContainerOps: Sealed + Send + Sync {
    /// Create a container from the given configuration.
    async fn create_container(&self, config: &ContainerConfig)
    -> Result<ContainerId, ContainerError>;

    /// Start a created container.
    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError>;

    /// Stop a running container, killing it after `timeout`.
    async fn stop_container(&self, id: &ContainerId, timeout: Duration)
    -> Result<(), ContainerError>;

    /// Remove a container.
    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError>;

    /// Get the observed configuration of a container.
    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError>;

    /// List containers matching the given filters.
    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError>;

    /// Find a container by its exact name, running or not.
    async fn find_container(&self, name: &str) -> Result<Option<ContainerSummary>, ContainerError> {
        let filters = ContainerFilters {
            name: Some(name.to_string()),
            all: true,
            ..Default::default()
        };
        // The runtime's name filter is a substring match.
        Ok(self
            .list_containers(&filters)
            .await?
            .into_iter()
            .find(|c| c.name == name))
    }
}

/// Filters for listing containers.
#[derive(Debug, Clone, Default)]
pub struct ContainerFilters {
    /// Filter by label (key=value), all must match.
    pub labels: HashMap<String, String>,
    /// Filter by name (partial match).
    pub name: Option<String>,
    /// Include stopped containers.
    pub all: bool,
}

impl ContainerFilters {
    /// All containers, running or stopped, carrying the given label.
    pub fn labeled(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            labels: HashMap::from([(key.into(), value.into())]),
            name: None,
            all: true,
        }
    }
}

/// Summary information about a container.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    pub id: ContainerId,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    /// Human readable status (e.g. "Up 3 minutes").
    pub status: String,
    pub labels: HashMap<String, String>,
}

/// Errors from container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container already exists: {0}")]
    AlreadyExists(String),

    #[error("container not running: {0}")]
    NotRunning(String),

    #[error("container already running: {0}")]
    AlreadyRunning(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
