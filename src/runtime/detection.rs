// ABOUTME: Local container runtime detection for Docker and Podman.
// ABOUTME: Honors an explicit override, otherwise probes Podman sockets before Docker.

use super::types::{RuntimeConfig, RuntimeInfo, RuntimeType};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("no container runtime found (checked Podman and Docker sockets)")]
    NoRuntimeFound,

    #[error("configured {runtime} socket does not exist: {path}")]
    SocketMissing { runtime: RuntimeType, path: String },
}

const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Detect the container runtime on this host.
///
/// An explicit `runtime` in the configuration wins. Otherwise the order is
/// rootless Podman, rootful Podman, then Docker.
pub fn detect_runtime(config: &RuntimeConfig) -> Result<RuntimeInfo, DetectionError> {
    if let Some(runtime_type) = config.runtime {
        let socket_path = config
            .socket
            .clone()
            .unwrap_or_else(|| default_socket_path(runtime_type));
        if !Path::new(&socket_path).exists() {
            return Err(DetectionError::SocketMissing {
                runtime: runtime_type,
                path: socket_path,
            });
        }
        return Ok(RuntimeInfo {
            runtime_type,
            socket_path,
        });
    }

    let candidates = rootless_podman_socket()
        .into_iter()
        .map(|path| (RuntimeType::Podman, path))
        .chain([
            (RuntimeType::Podman, ROOTFUL_PODMAN.to_string()),
            (RuntimeType::Docker, DOCKER_SOCKET.to_string()),
        ]);

    for (runtime_type, socket_path) in candidates {
        if Path::new(&socket_path).exists() {
            tracing::debug!(%runtime_type, socket = %socket_path, "Detected container runtime");
            return Ok(RuntimeInfo {
                runtime_type,
                socket_path,
            });
        }
    }

    Err(DetectionError::NoRuntimeFound)
}

fn rootless_podman_socket() -> Option<String> {
    current_uid().map(|uid| format!("/run/user/{uid}/podman/podman.sock"))
}

fn current_uid() -> Option<String> {
    std::env::var("UID").ok().or_else(|| {
        std::fs::read_to_string("/proc/self/status")
            .ok()?
            .lines()
            .find(|l| l.starts_with("Uid:"))?
            .split_whitespace()
            .nth(1)
            .map(str::to_string)
    })
}

fn default_socket_path(runtime: RuntimeType) -> String {
    match runtime {
        RuntimeType::Docker => DOCKER_SOCKET.to_string(),
        RuntimeType::Podman => ROOTFUL_PODMAN.to_string(),
    }
}
