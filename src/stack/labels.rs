// ABOUTME: Deterministic runtime object names and ownership labels for stacks.
// ABOUTME: Names are <prefix>_<stack>[_<part>]; labels are <prefix>.<key>.

use crate::runtime::ContainerFilters;
use crate::types::StackId;
use std::collections::HashMap;

/// Value of the `managed_by` label on everything this tool creates.
pub const MANAGED_BY: &str = "stackyard";

/// `service` label value for the stack network.
pub const NETWORK_ROLE: &str = "_network";

/// `service` label value for stack volumes.
pub const VOLUME_ROLE: &str = "_volume";

/// Builds names and labels under one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    prefix: String,
}

impl Default for Naming {
    fn default() -> Self {
        Self::new(MANAGED_BY)
    }
}

impl Naming {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn network(&self, stack: &StackId) -> String {
        format!("{}_{}", self.prefix, stack)
    }

    pub fn container(&self, stack: &StackId, service: &str) -> String {
        format!("{}_{}_{}", self.prefix, stack, service)
    }

    pub fn volume(&self, stack: &StackId, volume: &str) -> String {
        format!("{}_{}_{}", self.prefix, stack, volume)
    }

    /// Fully qualified label key, e.g. `stackyard.stack_id`.
    pub fn key(&self, name: &str) -> String {
        format!("{}.{}", self.prefix, name)
    }

    /// Every container belonging to the stack, running or not.
    pub fn stack_filter(&self, stack: &StackId) -> ContainerFilters {
        ContainerFilters::labeled(self.key("stack_id"), stack.as_str())
    }

    /// Labels shared by every object of a stack. `role` is a service name or
    /// one of [`NETWORK_ROLE`] and [`VOLUME_ROLE`].
    pub fn labels(
        &self,
        stack: &StackId,
        version: Option<&str>,
        role: Option<&str>,
    ) -> HashMap<String, String> {
        let mut labels = HashMap::from([
            (self.key("orchestrator"), "true".to_string()),
            (self.key("managed_by"), MANAGED_BY.to_string()),
            (self.key("stack_id"), stack.to_string()),
        ]);
        if let Some(version) = version {
            labels.insert(self.key("stack_version"), version.to_string());
        }
        if let Some(role) = role {
            labels.insert(self.key("service"), role.to_string());
        }
        labels
    }

    pub fn container_labels(
        &self,
        stack: &StackId,
        version: &str,
        service: &str,
    ) -> HashMap<String, String> {
        let mut labels = self.labels(stack, Some(version), Some(service));
        labels.insert(self.key("container_name"), self.container(stack, service));
        labels.insert(self.key("network_name"), self.network(stack));
        labels
    }
}
