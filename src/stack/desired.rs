// ABOUTME: Builds the desired container configuration for one stack service.
// ABOUTME: Shared by apply and the dry-run plan so both compare the same thing.

use super::labels::Naming;
use super::spec::ServiceSpec;
use crate::runtime::{ContainerConfig, VolumeMount};
use crate::types::{ServiceName, StackId};

pub fn container_config(
    naming: &Naming,
    stack: &StackId,
    version: &str,
    service: &ServiceName,
    spec: &ServiceSpec,
) -> ContainerConfig {
    let mut ports = spec.ports.clone();
    ports.sort();
    ports.dedup();

    ContainerConfig {
        name: naming.container(stack, service.as_str()),
        image: spec.image.clone(),
        hostname: Some(service.to_string()),
        env: spec.environment.clone(),
        labels: naming.container_labels(stack, version, service.as_str()),
        ports,
        mounts: spec
            .mounts
            .iter()
            .map(|m| VolumeMount {
                volume: naming.volume(stack, &m.volume),
                target: m.target.clone(),
                read_only: m.read_only,
            })
            .collect(),
        command: spec.command.clone(),
        network: Some(naming.network(stack)),
        network_aliases: vec![service.as_alias()],
    }
}
