// ABOUTME: Compares a desired container configuration with an observed container.
// ABOUTME: Any difference means the container must be replaced; there is no live update.

use crate::runtime::{ContainerConfig, ContainerInfo};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// The first attribute found to differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Drift {
    Image,
    Environment,
    Ports,
    Hostname,
    Command,
    Network,
    Aliases,
    Mounts,
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Drift::Image => "image",
            Drift::Environment => "environment",
            Drift::Ports => "ports",
            Drift::Hostname => "hostname",
            Drift::Command => "command",
            Drift::Network => "network",
            Drift::Aliases => "aliases",
            Drift::Mounts => "mounts",
        };
        f.write_str(s)
    }
}

fn non_blank(args: &[String]) -> Vec<&str> {
    args.iter()
        .map(String::as_str)
        .filter(|a| !a.trim().is_empty())
        .collect()
}

/// Return the first drifted attribute, or `None` when the container matches.
pub fn diff(desired: &ContainerConfig, observed: &ContainerInfo) -> Option<Drift> {
    if desired.image.to_string() != observed.image {
        return Some(Drift::Image);
    }

    // The container sees the image env with the configured values on top.
    let mut desired_env = observed.image_env.clone();
    desired_env.extend(desired.env.iter().map(|(k, v)| (k.clone(), v.clone())));
    if desired_env != observed.env {
        return Some(Drift::Environment);
    }

    let desired_ports: BTreeSet<_> = desired.ports.iter().collect();
    let observed_ports: BTreeSet<_> = observed.ports.iter().collect();
    if desired_ports != observed_ports {
        return Some(Drift::Ports);
    }

    if desired.hostname.as_deref().unwrap_or_default() != observed.hostname {
        return Some(Drift::Hostname);
    }

    // No command, or only blank arguments, means the image default.
    let desired_cmd = match desired.command.as_deref().map(non_blank) {
        Some(args) if !args.is_empty() => args,
        _ => non_blank(&observed.image_command),
    };
    if desired_cmd != non_blank(&observed.command) {
        return Some(Drift::Command);
    }

    if let Some(network) = &desired.network {
        let Some(attached) = observed.networks.get(network) else {
            return Some(Drift::Network);
        };
        let missing_alias = desired
            .network_aliases
            .iter()
            .any(|alias| !attached.aliases.iter().any(|a| a == alias.as_str()));
        if missing_alias {
            return Some(Drift::Aliases);
        }
    }

    let desired_mounts: BTreeSet<_> = desired.mounts.iter().collect();
    let observed_mounts: BTreeSet<_> = observed.mounts.iter().collect();
    if desired_mounts != observed_mounts {
        return Some(Drift::Mounts);
    }

    None
}

/// True when the observed container matches the desired configuration.
pub fn is_same(desired: &ContainerConfig, observed: &ContainerInfo) -> bool {
    diff(desired, observed).is_none()
}
