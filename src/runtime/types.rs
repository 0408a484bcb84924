// ABOUTME: Runtime type definitions for Docker and Podman.
// ABOUTME: RuntimeType, detected RuntimeInfo and the configurable RuntimeConfig override.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    Docker,
    Podman,
}

impl std::fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeType::Docker => write!(f, "docker"),
            RuntimeType::Podman => write!(f, "podman"),
        }
    }
}

/// A runtime found on this host.
#[derive(Debug, Clone)]
pub struct RuntimeInfo {
    pub runtime_type: RuntimeType,
    pub socket_path: String,
}

/// Explicit runtime selection from the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Overrides auto-detection.
    #[serde(default)]
    pub runtime: Option<RuntimeType>,
    /// Overrides the default socket for the runtime.
    #[serde(default)]
    pub socket: Option<String>,
}
