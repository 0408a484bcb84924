// ABOUTME: In-memory runtime used by engine unit tests.
// ABOUTME: Holds containers, networks and volumes in maps and records each mutating call.

use super::traits::sealed::Sealed;
use super::traits::*;
use crate::types::{ContainerId, ImageRef, NetworkId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Duration;

#[derive(Default)]
struct State {
    next_id: u64,
    /// Keyed by container name.
    containers: BTreeMap<String, ContainerInfo>,
    networks: BTreeMap<String, NetworkId>,
    volumes: BTreeSet<String>,
    calls: Vec<String>,
    exec_result: Option<ExecResult>,
    broken_inspect: HashSet<String>,
    broken_stop: HashSet<String>,
    broken_volume_removal: HashSet<String>,
    /// Keyed by the image reference as displayed.
    broken_pulls: HashMap<String, PullFailure>,
    logs: HashMap<String, Vec<String>>,
}

impl State {
    fn next_id(&mut self, kind: &str) -> String {
        self.next_id += 1;
        format!("{kind}-{}", self.next_id)
    }

    fn by_id(&mut self, id: &ContainerId) -> Result<&mut ContainerInfo, ContainerError> {
        self.containers
            .values_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))
    }
}

/// How a pull of a particular image misbehaves.
#[derive(Debug, Clone, Copy)]
pub enum PullFailure {
    /// The registry answers with an error.
    Error,
    /// The pull never completes.
    Hang,
}

#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<State>,
}

impl FakeRuntime {
    /// Mutating calls so far, e.g. `"create sy_app_web"`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn container(&self, name: &str) -> Option<ContainerInfo> {
        self.state.lock().containers.get(name).cloned()
    }

    pub fn container_names(&self) -> Vec<String> {
        self.state.lock().containers.keys().cloned().collect()
    }

    pub fn has_network(&self, name: &str) -> bool {
        self.state.lock().networks.contains_key(name)
    }

    pub fn has_volume(&self, name: &str) -> bool {
        self.state.lock().volumes.contains(name)
    }

    /// Change a container in place, as if someone edited it behind our back.
    pub fn modify(&self, name: &str, change: impl FnOnce(&mut ContainerInfo)) {
        if let Some(info) = self.state.lock().containers.get_mut(name) {
            change(info);
        }
    }

    /// Add a running container without recording a call.
    pub fn seed(&self, name: &str, labels: HashMap<String, String>) {
        let mut state = self.state.lock();
        let id = state.next_id("container");
        state.containers.insert(
            name.to_string(),
            ContainerInfo {
                id: ContainerId::new(id),
                name: name.to_string(),
                image: "busybox:latest".to_string(),
                state: ContainerState::Running,
                hostname: String::new(),
                env: BTreeMap::new(),
                command: Vec::new(),
                image_env: BTreeMap::new(),
                image_command: Vec::new(),
                ports: Vec::new(),
                mounts: Vec::new(),
                labels,
                networks: HashMap::new(),
            },
        );
    }

    pub fn set_exec_result(&self, result: ExecResult) {
        self.state.lock().exec_result = Some(result);
    }

    pub fn break_inspect(&self, name: &str) {
        self.state.lock().broken_inspect.insert(name.to_string());
    }

    pub fn break_stop(&self, name: &str) {
        self.state.lock().broken_stop.insert(name.to_string());
    }

    pub fn break_volume_removal(&self, name: &str) {
        self.state.lock().broken_volume_removal.insert(name.to_string());
    }

    pub fn break_pull(&self, image: &str, failure: PullFailure) {
        let reference = ImageRef::parse(image).expect("valid image reference");
        self.state
            .lock()
            .broken_pulls
            .insert(reference.to_string(), failure);
    }

    pub fn set_logs(&self, name: &str, lines: &[&str]) {
        self.state.lock().logs.insert(
            name.to_string(),
            lines.iter().map(|l| l.to_string()).collect(),
        );
    }
}

impl Sealed for FakeRuntime {}

#[async_trait]
impl ImageOps for FakeRuntime {
    async fn pull_image(&self, reference: &ImageRef) -> Result<(), ImageError> {
        let failure = {
            let mut state = self.state.lock();
            state.calls.push(format!("pull {reference}"));
            state.broken_pulls.get(&reference.to_string()).copied()
        };
        match failure {
            None => Ok(()),
            Some(PullFailure::Error) => Err(ImageError::PullFailed(format!(
                "manifest for {reference} not found"
            ))),
            Some(PullFailure::Hang) => std::future::pending().await,
        }
    }

    async fn image_exists(&self, _reference: &ImageRef) -> Result<bool, ImageError> {
        Ok(true)
    }
}

#[async_trait]
impl ContainerOps for FakeRuntime {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        let mut state = self.state.lock();
        if state.containers.contains_key(&config.name) {
            return Err(ContainerError::AlreadyExists(config.name.clone()));
        }
        let id = ContainerId::new(state.next_id("container"));
        let mut networks = HashMap::new();
        if let Some(network) = &config.network {
            let network_id = state
                .networks
                .get(network)
                .map(|id| id.to_string())
                .unwrap_or_default();
            networks.insert(
                network.clone(),
                NetworkInfo {
                    network_id,
                    aliases: config
                        .network_aliases
                        .iter()
                        .map(|a| a.as_str().to_string())
                        .collect(),
                },
            );
        }
        state.containers.insert(
            config.name.clone(),
            ContainerInfo {
                id: id.clone(),
                name: config.name.clone(),
                image: config.image.to_string(),
                state: ContainerState::Created,
                hostname: config.hostname.clone().unwrap_or_default(),
                env: config.env.clone(),
                command: config.command.clone().unwrap_or_default(),
                image_env: BTreeMap::new(),
                image_command: Vec::new(),
                ports: config.ports.clone(),
                mounts: config.mounts.clone(),
                labels: config.labels.clone(),
                networks,
            },
        );
        state.calls.push(format!("create {}", config.name));
        Ok(id)
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        let info = state.by_id(id)?;
        if info.state == ContainerState::Running {
            return Err(ContainerError::AlreadyRunning(info.name.clone()));
        }
        info.state = ContainerState::Running;
        let call = format!("start {}", info.name);
        state.calls.push(call);
        Ok(())
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        _timeout: Duration,
    ) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        let broken = state.broken_stop.clone();
        let info = state.by_id(id)?;
        if broken.contains(&info.name) {
            return Err(ContainerError::Runtime(format!("stop of {} timed out", info.name)));
        }
        if info.state != ContainerState::Running {
            return Err(ContainerError::NotRunning(info.name.clone()));
        }
        info.state = ContainerState::Exited;
        let call = format!("stop {}", info.name);
        state.calls.push(call);
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        let info = state.by_id(id)?;
        if info.state == ContainerState::Running && !force {
            return Err(ContainerError::AlreadyRunning(info.name.clone()));
        }
        let name = info.name.clone();
        state.containers.remove(&name);
        state.calls.push(format!("remove {name}"));
        Ok(())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        let mut state = self.state.lock();
        let info = state.by_id(id)?.clone();
        if state.broken_inspect.contains(&info.name) {
            return Err(ContainerError::Runtime(format!("inspect of {} failed", info.name)));
        }
        Ok(info)
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let state = self.state.lock();
        Ok(state
            .containers
            .values()
            .filter(|c| filters.all || c.state == ContainerState::Running)
            .filter(|c| filters.name.as_ref().is_none_or(|n| c.name.contains(n.as_str())))
            .filter(|c| {
                filters
                    .labels
                    .iter()
                    .all(|(k, v)| c.labels.get(k) == Some(v))
            })
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                name: c.name.clone(),
                image: c.image.clone(),
                state: c.state,
                status: c.state.to_string(),
                labels: c.labels.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl NetworkOps for FakeRuntime {
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError> {
        let mut state = self.state.lock();
        if state.networks.contains_key(&config.name) {
            return Err(NetworkError::AlreadyExists(config.name.clone()));
        }
        let id = NetworkId::new(state.next_id("network"));
        state.networks.insert(config.name.clone(), id.clone());
        state.calls.push(format!("create_network {}", config.name));
        Ok(id)
    }

    async fn remove_network(&self, id: &NetworkId) -> Result<(), NetworkError> {
        let mut state = self.state.lock();
        let Some(name) = state
            .networks
            .iter()
            .find(|(_, n)| *n == id)
            .map(|(name, _)| name.clone())
        else {
            return Err(NetworkError::NotFound(id.to_string()));
        };
        state.networks.remove(&name);
        state.calls.push(format!("remove_network {name}"));
        Ok(())
    }

    async fn find_network(&self, name: &str) -> Result<Option<NetworkId>, NetworkError> {
        Ok(self.state.lock().networks.get(name).cloned())
    }
}

#[async_trait]
impl VolumeOps for FakeRuntime {
    async fn volume_exists(&self, name: &str) -> Result<bool, VolumeError> {
        Ok(self.state.lock().volumes.contains(name))
    }

    async fn create_volume(&self, config: &VolumeConfig) -> Result<(), VolumeError> {
        let mut state = self.state.lock();
        state.volumes.insert(config.name.clone());
        state.calls.push(format!("create_volume {}", config.name));
        Ok(())
    }

    async fn remove_volume(&self, name: &str, _force: bool) -> Result<(), VolumeError> {
        let mut state = self.state.lock();
        if state.broken_volume_removal.contains(name) {
            return Err(VolumeError::InUse(name.to_string()));
        }
        if !state.volumes.remove(name) {
            return Err(VolumeError::NotFound(name.to_string()));
        }
        state.calls.push(format!("remove_volume {name}"));
        Ok(())
    }
}

#[async_trait]
impl ExecOps for FakeRuntime {
    async fn exec(
        &self,
        container: &ContainerId,
        config: &ExecConfig,
    ) -> Result<ExecResult, ExecError> {
        let mut state = self.state.lock();
        let info = state
            .by_id(container)
            .map_err(|_| ExecError::ContainerNotFound(container.to_string()))?;
        if info.state != ContainerState::Running {
            return Err(ExecError::ContainerNotRunning(info.name.clone()));
        }
        let call = format!("exec {} {}", info.name, config.cmd.join(" "));
        state.calls.push(call);
        Ok(state.exec_result.clone().unwrap_or(ExecResult {
            exit_code: 0,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }))
    }
}

#[async_trait]
impl LogOps for FakeRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<LogLineStream, LogError> {
        let mut state = self.state.lock();
        let name = state
            .by_id(id)
            .map_err(|_| LogError::ContainerNotFound(id.to_string()))?
            .name
            .clone();
        let lines = state.logs.get(&name).cloned().unwrap_or_default();
        let skip = match opts.tail {
            Some(n) => lines.len().saturating_sub(n as usize),
            None => 0,
        };
        let items: Vec<Result<LogLine, LogError>> = lines
            .into_iter()
            .skip(skip)
            .map(|content| {
                Ok(LogLine {
                    content,
                    stream: LogStream::Stdout,
                })
            })
            .collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

#[async_trait]
impl RuntimeInfo for FakeRuntime {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        Ok(RuntimeMetadata {
            name: "fake".to_string(),
            version: "0".to_string(),
            api_version: "0".to_string(),
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        Ok(())
    }
}
