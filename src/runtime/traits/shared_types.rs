// ABOUTME: Shared types used across runtime trait definitions.
// ABOUTME: ContainerConfig (desired), ContainerInfo (observed), network, volume and exec types.

use crate::types::{ContainerId, ImageRef, NetworkAlias};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Desired configuration for creating a container.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    pub name: String,
    pub image: ImageRef,
    pub hostname: Option<String>,
    pub env: BTreeMap<String, String>,
    pub labels: HashMap<String, String>,
    pub ports: Vec<PortMapping>,
    pub mounts: Vec<VolumeMount>,
    /// Overrides the image CMD when set.
    pub command: Option<Vec<String>>,
    /// Network to attach at creation time.
    pub network: Option<String>,
    pub network_aliases: Vec<NetworkAlias>,
}

/// A published port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PortMapping {
    pub host_port: u16,
    pub container_port: u16,
    pub protocol: Protocol,
}

impl PortMapping {
    pub fn tcp(host_port: u16, container_port: u16) -> Self {
        Self {
            host_port,
            container_port,
            protocol: Protocol::Tcp,
        }
    }

    /// Runtime key for the container side, e.g. `80/tcp`.
    pub fn container_key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol)
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host_port, self.container_key())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("tcp"),
            Protocol::Udp => f.write_str("udp"),
        }
    }
}

/// A named volume mounted into a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VolumeMount {
    /// Runtime volume name.
    pub volume: String,
    /// Path inside the container.
    pub target: String,
    pub read_only: bool,
}

/// True for the 64-character hex names runtimes give volumes created from an
/// image's `VOLUME` directive.
pub fn is_anonymous_volume(name: &str) -> bool {
    name.len() == 64 && name.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Observed state and configuration of a container.
///
/// `env` and `command` are the container's effective values, image defaults
/// included. The defaults are reported separately so a [`ContainerConfig`]
/// can be resolved against them before comparing. `mounts` holds named
/// volumes only.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub id: ContainerId,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    pub hostname: String,
    pub env: BTreeMap<String, String>,
    pub command: Vec<String>,
    /// Environment baked into the image.
    pub image_env: BTreeMap<String, String>,
    /// The image's default `CMD`.
    pub image_command: Vec<String>,
    pub ports: Vec<PortMapping>,
    pub mounts: Vec<VolumeMount>,
    pub labels: HashMap<String, String>,
    /// Attached networks by name.
    pub networks: HashMap<String, NetworkInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Restarting => "restarting",
            ContainerState::Removing => "removing",
            ContainerState::Exited => "exited",
            ContainerState::Dead => "dead",
        };
        f.write_str(s)
    }
}

/// A container's attachment to one network.
#[derive(Debug, Clone, Default)]
pub struct NetworkInfo {
    pub network_id: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub name: String,
    /// Defaults to the runtime's bridge driver.
    pub driver: Option<String>,
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct VolumeConfig {
    pub name: String,
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct RuntimeMetadata {
    pub name: String,
    pub version: String,
    pub api_version: String,
    pub os: String,
    pub arch: String,
}

/// A command to run inside a container.
#[derive(Debug, Clone, Default)]
pub struct ExecConfig {
    pub cmd: Vec<String>,
    /// `KEY=VALUE` entries added to the container environment.
    pub env: Vec<String>,
    pub working_dir: Option<String>,
    pub user: Option<String>,
}

impl ExecConfig {
    pub fn command(cmd: Vec<String>) -> Self {
        Self {
            cmd,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecResult {
    pub exit_code: i64,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}
