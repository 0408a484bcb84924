// ABOUTME: Bollard-based container runtime implementation.
// ABOUTME: Talks to Docker or Podman over the Docker-compatible API on a local socket.

use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    ContainerConfig, ContainerError, ContainerFilters, ContainerInfo, ContainerOps, ContainerState,
    ContainerSummary, ExecConfig, ExecError, ExecOps, ExecResult, ImageError, ImageOps, LogError,
    LogLine, LogLineStream, LogOps, LogOptions, LogStream, NetworkConfig, NetworkError,
    NetworkInfo, NetworkOps, PortMapping, Protocol, RuntimeInfo, RuntimeInfoError,
    RuntimeMetadata, VolumeConfig, VolumeError, VolumeMount, VolumeOps, is_anonymous_volume,
};
use crate::runtime::types::{RuntimeInfo as DetectedRuntime, RuntimeType};
use crate::types::{ContainerId, ImageRef, NetworkId};
use async_trait::async_trait;
use bollard::Docker;
use bollard::errors::Error as BollardError;
use bollard::exec::StartExecOptions;
use bollard::models::{
    ContainerCreateBody, EndpointSettings, HostConfig, Mount, MountPointTypeEnum, MountTypeEnum,
    PortBinding,
};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, InspectContainerOptions, InspectNetworkOptions,
    ListContainersOptions, LogsOptions, RemoveContainerOptions, RemoveVolumeOptions,
    StopContainerOptions,
};
use futures::StreamExt;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

/// Status code and message of an API error response, if that is what `e` is.
fn server_error(e: &BollardError) -> Option<(u16, &str)> {
    match e {
        BollardError::DockerResponseServerError {
            status_code,
            message,
        } => Some((*status_code, message.as_str())),
        _ => None,
    }
}

fn map_container_create_error(e: BollardError) -> ContainerError {
    match server_error(&e) {
        Some((404, msg)) => ContainerError::ImageNotFound(msg.to_string()),
        Some((409, msg)) => ContainerError::AlreadyExists(msg.to_string()),
        Some((400, msg)) => ContainerError::InvalidConfig(msg.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_start_error(e: BollardError) -> ContainerError {
    match server_error(&e) {
        Some((404, msg)) => ContainerError::NotFound(msg.to_string()),
        Some((304, msg)) => ContainerError::AlreadyRunning(msg.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_stop_error(e: BollardError) -> ContainerError {
    match server_error(&e) {
        Some((404, msg)) => ContainerError::NotFound(msg.to_string()),
        Some((304, msg)) => ContainerError::NotRunning(msg.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_not_found_error(e: BollardError) -> ContainerError {
    match server_error(&e) {
        Some((404, msg)) => ContainerError::NotFound(msg.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_network_create_error(e: BollardError) -> NetworkError {
    match server_error(&e) {
        Some((409, msg)) => NetworkError::AlreadyExists(msg.to_string()),
        _ => NetworkError::Runtime(e.to_string()),
    }
}

fn map_network_remove_error(e: BollardError) -> NetworkError {
    match server_error(&e) {
        Some((404, msg)) => NetworkError::NotFound(msg.to_string()),
        Some((403 | 409, msg)) => NetworkError::InUse(msg.to_string()),
        _ => NetworkError::Runtime(e.to_string()),
    }
}

fn map_volume_remove_error(e: BollardError) -> VolumeError {
    match server_error(&e) {
        Some((404, msg)) => VolumeError::NotFound(msg.to_string()),
        Some((409, msg)) => VolumeError::InUse(msg.to_string()),
        _ => VolumeError::Runtime(e.to_string()),
    }
}

fn map_exec_create_error(e: BollardError) -> ExecError {
    match server_error(&e) {
        Some((404, msg)) => ExecError::ContainerNotFound(msg.to_string()),
        Some((409, msg)) => ExecError::ContainerNotRunning(msg.to_string()),
        _ => ExecError::Runtime(e.to_string()),
    }
}

// =============================================================================
// Inspect conversion helpers
// =============================================================================

fn parse_state(raw: &str) -> ContainerState {
    match raw {
        "created" => ContainerState::Created,
        "running" => ContainerState::Running,
        "paused" => ContainerState::Paused,
        "restarting" => ContainerState::Restarting,
        "removing" => ContainerState::Removing,
        "dead" => ContainerState::Dead,
        _ => ContainerState::Exited,
    }
}

fn parse_env(entries: &[String]) -> BTreeMap<String, String> {
    entries
        .iter()
        .filter_map(|e| e.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn parse_port_bindings(
    bindings: &HashMap<String, Option<Vec<PortBinding>>>,
) -> Vec<PortMapping> {
    let mut ports = Vec::new();
    for (key, hosts) in bindings {
        let (port, proto) = key.split_once('/').unwrap_or((key.as_str(), "tcp"));
        let Ok(container_port) = port.parse::<u16>() else {
            continue;
        };
        let protocol = if proto == "udp" {
            Protocol::Udp
        } else {
            Protocol::Tcp
        };
        for binding in hosts.iter().flatten() {
            if let Some(host_port) = binding.host_port.as_deref().and_then(|p| p.parse().ok()) {
                ports.push(PortMapping {
                    host_port,
                    container_port,
                    protocol,
                });
            }
        }
    }
    ports.sort();
    ports.dedup();
    ports
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Container runtime backed by bollard.
///
/// Podman is driven through its Docker-compatible API. Exec output is the one
/// place the two differ.
pub struct BollardRuntime {
    client: Docker,
    runtime_type: RuntimeType,
}

impl BollardRuntime {
    pub fn new(client: Docker, runtime_type: RuntimeType) -> Self {
        Self {
            client,
            runtime_type,
        }
    }

    /// Connect to a runtime found by [`crate::runtime::detect_runtime`].
    pub fn connect(info: &DetectedRuntime) -> Result<Self, RuntimeInfoError> {
        let client =
            Docker::connect_with_unix(&info.socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;
        Ok(Self::new(client, info.runtime_type))
    }

    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }

    /// Environment and command baked into an image, used to tell them apart
    /// from values set on the container.
    async fn image_defaults(&self, image: &str) -> (BTreeMap<String, String>, Vec<String>) {
        match self.client.inspect_image(image).await {
            Ok(inspect) => {
                let config = inspect.config.unwrap_or_default();
                (
                    parse_env(&config.env.unwrap_or_default()),
                    config.cmd.unwrap_or_default(),
                )
            }
            Err(e) => {
                tracing::debug!(image, error = %e, "Image inspect failed; keeping full container env");
                (BTreeMap::new(), Vec::new())
            }
        }
    }

    /// Podman's attached exec streams may never close, so run detached and poll.
    async fn exec_detached(&self, exec_id: &str) -> Result<ExecResult, ExecError> {
        let opts = StartExecOptions {
            detach: true,
            ..Default::default()
        };
        self.client
            .start_exec(exec_id, Some(opts))
            .await
            .map_err(|e| ExecError::Failed(e.to_string()))?;

        loop {
            let details = self
                .client
                .inspect_exec(exec_id)
                .await
                .map_err(|e| ExecError::Runtime(e.to_string()))?;
            if !details.running.unwrap_or(false) {
                return Ok(ExecResult {
                    exit_code: details.exit_code.unwrap_or(0),
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                });
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn exec_attached(&self, exec_id: &str) -> Result<ExecResult, ExecError> {
        let result = self
            .client
            .start_exec(exec_id, None::<StartExecOptions>)
            .await
            .map_err(|e| ExecError::Failed(e.to_string()))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        if let bollard::exec::StartExecResults::Attached { mut output, .. } = result {
            while let Some(item) = output.next().await {
                match item {
                    Ok(bollard::container::LogOutput::StdOut { message }) => {
                        stdout.extend(message)
                    }
                    Ok(bollard::container::LogOutput::StdErr { message }) => {
                        stderr.extend(message)
                    }
                    Ok(_) => {}
                    Err(e) => return Err(ExecError::Failed(e.to_string())),
                }
            }
        }

        let details = self
            .client
            .inspect_exec(exec_id)
            .await
            .map_err(|e| ExecError::Runtime(e.to_string()))?;

        Ok(ExecResult {
            exit_code: details.exit_code.unwrap_or(0),
            stdout,
            stderr,
        })
    }
}

impl Sealed for BollardRuntime {}

#[async_trait]
impl RuntimeInfo for BollardRuntime {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        let info = self
            .client
            .info()
            .await
            .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;

        let name = match self.runtime_type {
            RuntimeType::Docker => "Docker".to_string(),
            RuntimeType::Podman => "Podman".to_string(),
        };

        Ok(RuntimeMetadata {
            name,
            version: info.server_version.unwrap_or_default(),
            api_version: bollard::API_DEFAULT_VERSION.to_string(),
            os: info.operating_system.unwrap_or_default(),
            arch: info.architecture.unwrap_or_default(),
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        self.client
            .ping()
            .await
            .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ImageOps for BollardRuntime {
    async fn pull_image(&self, reference: &ImageRef) -> Result<(), ImageError> {
        let image_name = reference.to_string();
        let opts = CreateImageOptions {
            from_image: Some(image_name.clone()),
            ..Default::default()
        };

        // Progress messages arrive as a stream; the pull is done when it ends.
        let mut stream = self.client.create_image(Some(opts), None, None);
        while let Some(result) = stream.next().await {
            result.map_err(|e| match server_error(&e) {
                Some((404, _)) => ImageError::NotFound(image_name.clone()),
                _ => ImageError::PullFailed(format!("{image_name}: {e}")),
            })?;
        }

        Ok(())
    }

    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        let image_name = reference.to_string();
        match self.client.inspect_image(&image_name).await {
            Ok(_) => Ok(true),
            Err(e) if matches!(server_error(&e), Some((404, _))) => Ok(false),
            Err(e) => Err(ImageError::Runtime(format!(
                "failed to inspect {image_name}: {e}"
            ))),
        }
    }
}

#[async_trait]
impl ContainerOps for BollardRuntime {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        let env: Vec<String> = config
            .env
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();

        let mut host_config = HostConfig::default();

        let mounts: Vec<Mount> = config
            .mounts
            .iter()
            .map(|m| Mount {
                source: Some(m.volume.clone()),
                target: Some(m.target.clone()),
                typ: Some(MountTypeEnum::VOLUME),
                read_only: Some(m.read_only),
                ..Default::default()
            })
            .collect();
        if !mounts.is_empty() {
            host_config.mounts = Some(mounts);
        }

        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        for port in &config.ports {
            port_bindings
                .entry(port.container_key())
                .or_insert_with(|| Some(Vec::new()))
                .get_or_insert_with(Vec::new)
                .push(PortBinding {
                    host_ip: None,
                    host_port: Some(port.host_port.to_string()),
                });
        }
        let exposed_ports: Vec<String> = port_bindings.keys().cloned().collect();
        if !port_bindings.is_empty() {
            host_config.port_bindings = Some(port_bindings);
        }

        let networking_config = match &config.network {
            Some(network) => {
                host_config.network_mode = Some(network.clone());
                let aliases: Vec<String> =
                    config.network_aliases.iter().map(|a| a.to_string()).collect();
                let endpoint = EndpointSettings {
                    aliases: (!aliases.is_empty()).then_some(aliases),
                    ..Default::default()
                };
                Some(bollard::models::NetworkingConfig {
                    endpoints_config: Some(HashMap::from([(network.clone(), endpoint)])),
                })
            }
            None => None,
        };

        let body = ContainerCreateBody {
            image: Some(config.image.to_string()),
            hostname: config.hostname.clone(),
            env: (!env.is_empty()).then_some(env),
            labels: (!config.labels.is_empty()).then(|| config.labels.clone()),
            cmd: config.command.clone(),
            host_config: Some(host_config),
            exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
            networking_config,
            ..Default::default()
        };

        let opts = CreateContainerOptions {
            name: Some(config.name.clone()),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(Some(opts), body)
            .await
            .map_err(map_container_create_error)?;

        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.client
            .start_container(
                id.as_str(),
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
            .map_err(map_container_start_error)
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError> {
        let opts = StopContainerOptions {
            t: Some(timeout.as_secs() as i32),
            signal: None,
        };

        self.client
            .stop_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_stop_error)
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        // `v` removes anonymous volumes only; named volumes outlive the container.
        let opts = RemoveContainerOptions {
            force,
            v: true,
            ..Default::default()
        };

        self.client
            .remove_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_not_found_error)
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_container_not_found_error)?;

        let state = details
            .state
            .as_ref()
            .and_then(|s| s.status)
            .map(|s| parse_state(&format!("{s:?}").to_lowercase()))
            .unwrap_or(ContainerState::Exited);

        let config = details.config.unwrap_or_default();
        let image = config.image.clone().unwrap_or_default();
        let (image_env, image_command) = self.image_defaults(&image).await;
        let env = parse_env(&config.env.unwrap_or_default());
        let command = config.cmd.unwrap_or_default();

        let ports = details
            .host_config
            .as_ref()
            .and_then(|h| h.port_bindings.as_ref())
            .map(parse_port_bindings)
            .unwrap_or_default();

        let mounts = details
            .mounts
            .unwrap_or_default()
            .into_iter()
            .filter(|m| m.typ == Some(MountPointTypeEnum::VOLUME))
            .filter(|m| !m.name.as_deref().is_some_and(is_anonymous_volume))
            .filter_map(|m| {
                Some(VolumeMount {
                    volume: m.name?,
                    target: m.destination?,
                    read_only: !m.rw.unwrap_or(true),
                })
            })
            .collect();

        let networks = details
            .network_settings
            .and_then(|n| n.networks)
            .unwrap_or_default()
            .into_iter()
            .map(|(name, endpoint)| {
                let info = NetworkInfo {
                    network_id: endpoint.network_id.unwrap_or_default(),
                    aliases: endpoint.aliases.unwrap_or_default(),
                };
                (name, info)
            })
            .collect();

        Ok(ContainerInfo {
            id: id.clone(),
            name: details
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            image,
            state,
            hostname: config.hostname.unwrap_or_default(),
            env,
            command,
            image_env,
            image_command,
            ports,
            mounts,
            labels: config.labels.unwrap_or_default(),
            networks,
        })
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let mut filter_map: HashMap<String, Vec<String>> = HashMap::new();

        if let Some(ref name) = filters.name {
            filter_map.insert("name".to_string(), vec![name.clone()]);
        }

        for (key, value) in &filters.labels {
            filter_map
                .entry("label".to_string())
                .or_default()
                .push(format!("{key}={value}"));
        }

        let opts = ListContainersOptions {
            all: filters.all,
            filters: Some(filter_map),
            ..Default::default()
        };

        let containers = self
            .client
            .list_containers(Some(opts))
            .await
            .map_err(|e| ContainerError::Runtime(e.to_string()))?;

        let mut summaries: Vec<ContainerSummary> = containers
            .into_iter()
            .map(|c| {
                let name = c
                    .names
                    .unwrap_or_default()
                    .first()
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_default();
                let state = c
                    .state
                    .map(|s| parse_state(&format!("{s:?}").to_lowercase()))
                    .unwrap_or(ContainerState::Exited);

                ContainerSummary {
                    id: ContainerId::new(c.id.unwrap_or_default()),
                    name,
                    image: c.image.unwrap_or_default(),
                    state,
                    status: c.status.unwrap_or_default(),
                    labels: c.labels.unwrap_or_default(),
                }
            })
            .collect();

        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }
}

#[async_trait]
impl NetworkOps for BollardRuntime {
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError> {
        let request = bollard::models::NetworkCreateRequest {
            name: config.name.clone(),
            driver: config.driver.clone(),
            labels: (!config.labels.is_empty()).then(|| config.labels.clone()),
            ..Default::default()
        };

        let response = self
            .client
            .create_network(request)
            .await
            .map_err(map_network_create_error)?;

        Ok(NetworkId::new(response.id))
    }

    async fn remove_network(&self, id: &NetworkId) -> Result<(), NetworkError> {
        self.client
            .remove_network(id.as_str())
            .await
            .map_err(map_network_remove_error)
    }

    async fn find_network(&self, name: &str) -> Result<Option<NetworkId>, NetworkError> {
        match self
            .client
            .inspect_network(name, None::<InspectNetworkOptions>)
            .await
        {
            Ok(network) => Ok(Some(NetworkId::new(
                network.id.unwrap_or_else(|| name.to_string()),
            ))),
            Err(e) if matches!(server_error(&e), Some((404, _))) => Ok(None),
            Err(e) => Err(NetworkError::Runtime(e.to_string())),
        }
    }
}

#[async_trait]
impl VolumeOps for BollardRuntime {
    async fn volume_exists(&self, name: &str) -> Result<bool, VolumeError> {
        match self.client.inspect_volume(name).await {
            Ok(_) => Ok(true),
            Err(e) if matches!(server_error(&e), Some((404, _))) => Ok(false),
            Err(e) => Err(VolumeError::Runtime(e.to_string())),
        }
    }

    async fn create_volume(&self, config: &VolumeConfig) -> Result<(), VolumeError> {
        let request = bollard::models::VolumeCreateRequest {
            name: Some(config.name.clone()),
            labels: (!config.labels.is_empty()).then(|| config.labels.clone()),
            ..Default::default()
        };

        self.client
            .create_volume(request)
            .await
            .map_err(|e| VolumeError::Runtime(e.to_string()))?;
        Ok(())
    }

    async fn remove_volume(&self, name: &str, force: bool) -> Result<(), VolumeError> {
        self.client
            .remove_volume(name, Some(RemoveVolumeOptions { force }))
            .await
            .map_err(map_volume_remove_error)
    }
}

#[async_trait]
impl ExecOps for BollardRuntime {
    async fn exec(
        &self,
        container: &ContainerId,
        config: &ExecConfig,
    ) -> Result<ExecResult, ExecError> {
        let opts = bollard::models::ExecConfig {
            cmd: Some(config.cmd.clone()),
            env: (!config.env.is_empty()).then(|| config.env.clone()),
            working_dir: config.working_dir.clone(),
            user: config.user.clone(),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let created = self
            .client
            .create_exec(container.as_str(), opts)
            .await
            .map_err(map_exec_create_error)?;

        match self.runtime_type {
            RuntimeType::Podman => self.exec_detached(&created.id).await,
            RuntimeType::Docker => self.exec_attached(&created.id).await,
        }
    }
}

#[async_trait]
impl LogOps for BollardRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<LogLineStream, LogError> {
        let log_opts = LogsOptions {
            stdout: opts.stdout,
            stderr: opts.stderr,
            follow: opts.follow,
            timestamps: opts.timestamps,
            tail: opts
                .tail
                .map(|n| n.to_string())
                .unwrap_or_else(|| "all".to_string()),
            ..Default::default()
        };

        let stream = self.client.logs(id.as_str(), Some(log_opts)).map(|result| {
            result
                .map(|output| {
                    let (stream, data) = match output {
                        bollard::container::LogOutput::StdErr { message } => {
                            (LogStream::Stderr, message)
                        }
                        bollard::container::LogOutput::StdOut { message }
                        | bollard::container::LogOutput::StdIn { message }
                        | bollard::container::LogOutput::Console { message } => {
                            (LogStream::Stdout, message)
                        }
                    };
                    LogLine {
                        content: String::from_utf8_lossy(&data).trim_end().to_string(),
                        stream,
                    }
                })
                .map_err(|e| match server_error(&e) {
                    Some((404, msg)) => LogError::ContainerNotFound(msg.to_string()),
                    _ => LogError::StreamError(e.to_string()),
                })
        });

        Ok(Box::pin(stream))
    }
}
