// ABOUTME: Stack specification model parsed from a compose-style version body.
// ABOUTME: Services with image, env, ports, dependencies, volume mounts and command.

use crate::runtime::{PortMapping, Protocol};
use crate::types::{ImageRef, NameError, ParseImageRefError, ServiceName};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("invalid stack body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("compose.services is empty")]
    NoServices,

    #[error("service {0} missing image")]
    MissingImage(String),

    #[error("service {service} has an invalid image: {source}")]
    InvalidImage {
        service: String,
        source: ParseImageRefError,
    },

    #[error(transparent)]
    InvalidServiceName(#[from] NameError),

    #[error("service {service} has an invalid port entry {entry:?}")]
    InvalidPort { service: String, entry: String },

    #[error("service {service} has an invalid volume entry {entry:?}")]
    InvalidMount { service: String, entry: String },

    #[error("service {service} uses a bind mount ({entry:?}); only named volumes are supported")]
    BindMount { service: String, entry: String },

    #[error("service {service} has an unterminated quote in its command")]
    UnterminatedQuote { service: String },
}

/// A parsed stack version body.
#[derive(Debug, Clone, PartialEq)]
pub struct StackSpec {
    pub services: BTreeMap<ServiceName, ServiceSpec>,
    /// Volumes declared under `compose.volumes`.
    pub volumes: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSpec {
    pub image: ImageRef,
    pub environment: BTreeMap<String, String>,
    pub ports: Vec<PortMapping>,
    pub depends_on: Vec<String>,
    pub mounts: Vec<MountSpec>,
    pub command: Option<Vec<String>>,
}

/// A service mount of a stack-scoped named volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    /// Volume name as written in the spec, before stack scoping.
    pub volume: String,
    pub target: String,
    pub read_only: bool,
}

#[derive(Deserialize)]
struct RawBody {
    #[serde(default)]
    compose: RawCompose,
}

#[derive(Default, Deserialize)]
struct RawCompose {
    #[serde(default)]
    services: BTreeMap<String, RawService>,
    #[serde(default)]
    volumes: Option<BTreeMap<String, Value>>,
}

#[derive(Deserialize)]
struct RawService {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    environment: Option<RawEnvironment>,
    #[serde(default)]
    ports: Vec<Value>,
    #[serde(default)]
    depends_on: Option<RawDependsOn>,
    #[serde(default)]
    volumes: Vec<String>,
    #[serde(default)]
    command: Option<RawCommand>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEnvironment {
    Map(BTreeMap<String, Value>),
    List(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDependsOn {
    List(Vec<String>),
    Map(BTreeMap<String, Value>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCommand {
    List(Vec<String>),
    Line(String),
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl StackSpec {
    /// Parse a version body of the form `{"compose": {"services": ..., "volumes": ...}}`.
    pub fn parse(body: &Value) -> Result<Self, SpecError> {
        let raw = RawBody::deserialize(body)?;
        Self::from_raw(raw.compose)
    }

    pub fn from_json_str(body: &str) -> Result<Self, SpecError> {
        let raw: RawBody = serde_json::from_str(body)?;
        Self::from_raw(raw.compose)
    }

    fn from_raw(compose: RawCompose) -> Result<Self, SpecError> {
        if compose.services.is_empty() {
            return Err(SpecError::NoServices);
        }

        let mut services = BTreeMap::new();
        for (name, raw) in compose.services {
            let service = ServiceName::new(&name)?;
            let spec = ServiceSpec::from_raw(&name, raw)?;
            services.insert(service, spec);
        }

        let volumes = compose.volumes.unwrap_or_default().into_keys().collect();

        Ok(Self { services, volumes })
    }

    /// Declared volumes plus every volume referenced by a mount.
    pub fn volume_names(&self) -> BTreeSet<String> {
        let mut names = self.volumes.clone();
        for service in self.services.values() {
            names.extend(service.mounts.iter().map(|m| m.volume.clone()));
        }
        names
    }

    /// Dependency edges in service order, for the resolver.
    pub fn dependencies(&self) -> Vec<(String, Vec<String>)> {
        self.services
            .iter()
            .map(|(name, svc)| (name.to_string(), svc.depends_on.clone()))
            .collect()
    }
}

impl ServiceSpec {
    fn from_raw(name: &str, raw: RawService) -> Result<Self, SpecError> {
        let image = match raw.image.as_deref().map(str::trim) {
            None | Some("") => return Err(SpecError::MissingImage(name.to_string())),
            Some(image) => ImageRef::parse(image).map_err(|source| SpecError::InvalidImage {
                service: name.to_string(),
                source,
            })?,
        };

        let environment = match raw.environment {
            None => BTreeMap::new(),
            Some(RawEnvironment::Map(map)) => map
                .into_iter()
                .map(|(k, v)| (k, scalar_to_string(&v)))
                .collect(),
            Some(RawEnvironment::List(entries)) => entries
                .iter()
                .filter_map(|e| e.split_once('='))
                .filter(|(k, _)| !k.is_empty())
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };

        let mut ports = Vec::new();
        for entry in raw.ports.iter().map(scalar_to_string) {
            if let Some(port) = parse_port(name, &entry)? {
                ports.push(port);
            }
        }

        let depends_on = match raw.depends_on {
            None => Vec::new(),
            Some(RawDependsOn::List(deps)) => deps,
            Some(RawDependsOn::Map(deps)) => deps.into_keys().collect(),
        };

        let mounts = raw
            .volumes
            .iter()
            .map(|entry| parse_mount(name, entry))
            .collect::<Result<Vec<_>, _>>()?;

        let command = match raw.command {
            None => None,
            Some(RawCommand::List(args)) => Some(args),
            Some(RawCommand::Line(line)) => Some(split_command(&line).ok_or_else(|| {
                SpecError::UnterminatedQuote {
                    service: name.to_string(),
                }
            })?),
        };

        Ok(Self {
            image,
            environment,
            ports,
            depends_on,
            mounts,
            command,
        })
    }
}

/// Parse `host:container[/proto]`. Entries without a host port publish
/// nothing and are skipped.
fn parse_port(service: &str, entry: &str) -> Result<Option<PortMapping>, SpecError> {
    let invalid = || SpecError::InvalidPort {
        service: service.to_string(),
        entry: entry.to_string(),
    };

    let (ports, protocol) = match entry.rsplit_once('/') {
        Some((ports, "tcp")) => (ports, Protocol::Tcp),
        Some((ports, "udp")) => (ports, Protocol::Udp),
        Some(_) => return Err(invalid()),
        None => (entry, Protocol::Tcp),
    };

    let parts: Vec<&str> = ports.split(':').collect();
    let [host, container] = parts.as_slice() else {
        tracing::warn!(service, entry, "Ignoring port entry without a host:container pair");
        return Ok(None);
    };

    let host_port = host.trim().parse::<u16>().map_err(|_| invalid())?;
    let container_port = container.trim().parse::<u16>().map_err(|_| invalid())?;

    Ok(Some(PortMapping {
        host_port,
        container_port,
        protocol,
    }))
}

/// Parse `volume:/path[:ro|:rw]`.
fn parse_mount(service: &str, entry: &str) -> Result<MountSpec, SpecError> {
    let invalid = || SpecError::InvalidMount {
        service: service.to_string(),
        entry: entry.to_string(),
    };

    let parts: Vec<&str> = entry.split(':').collect();
    let (volume, target, read_only) = match parts.as_slice() {
        [volume, target] => (*volume, *target, false),
        [volume, target, "ro"] => (*volume, *target, true),
        [volume, target, "rw"] => (*volume, *target, false),
        _ => return Err(invalid()),
    };

    if volume.starts_with(['/', '.', '~']) {
        return Err(SpecError::BindMount {
            service: service.to_string(),
            entry: entry.to_string(),
        });
    }
    if volume.is_empty() || !target.starts_with('/') {
        return Err(invalid());
    }

    Ok(MountSpec {
        volume: volume.to_string(),
        target: target.to_string(),
        read_only,
    })
}

/// Split a command line on whitespace, honoring single and double quotes and
/// backslash escapes. Returns `None` on an unterminated quote.
pub fn split_command(line: &str) -> Option<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') | (None, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_arg = true;
            }
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_arg = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_arg = true;
            }
        }
    }

    if quote.is_some() {
        return None;
    }
    if in_arg {
        args.push(current);
    }
    Some(args)
}
