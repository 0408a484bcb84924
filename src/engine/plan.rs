// ABOUTME: Read-only dry run of apply for one stored version.
// ABOUTME: Lists the network, volume and container actions an apply would take.

use super::{Engine, EngineError};
use crate::runtime::FullRuntime;
use crate::stack::{Drift, ServiceGraph, StackSpec, container_config, diff};
use crate::types::StackId;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlannedAction {
    CreateNetwork { name: String },
    EnsureVolume { name: String, exists: bool },
    CreateContainer { service: String, name: String },
    ReplaceContainer { service: String, name: String, drift: Drift },
    KeepContainer { service: String, name: String },
    RemoveOrphan { name: String },
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannedAction::CreateNetwork { name } => write!(f, "+ network {name}"),
            PlannedAction::EnsureVolume { name, exists: true } => write!(f, "= volume {name}"),
            PlannedAction::EnsureVolume { name, exists: false } => write!(f, "+ volume {name}"),
            PlannedAction::CreateContainer { service, name } => {
                write!(f, "+ {service} ({name})")
            }
            PlannedAction::ReplaceContainer {
                service,
                name,
                drift,
            } => write!(f, "~ {service} ({name}): {drift} changed"),
            PlannedAction::KeepContainer { service, name } => write!(f, "= {service} ({name})"),
            PlannedAction::RemoveOrphan { name } => write!(f, "- {name}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StackPlan {
    pub stack_id: String,
    pub version: String,
    pub actions: Vec<PlannedAction>,
}

impl StackPlan {
    /// True when applying would change nothing.
    pub fn is_noop(&self) -> bool {
        self.actions.iter().all(|a| {
            matches!(
                a,
                PlannedAction::KeepContainer { .. } | PlannedAction::EnsureVolume { exists: true, .. }
            )
        })
    }
}

impl<R: FullRuntime> Engine<R> {
    /// What applying `version` to `stack` would do right now.
    pub async fn plan(&self, stack: &StackId, version: &str) -> Result<StackPlan, EngineError> {
        let record = self
            .stacks
            .get_version(stack.as_str(), version)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("version {version} not found for stack {stack}"))
            })?;
        let spec = StackSpec::from_json_str(&record.body)?;
        let mut actions = Vec::new();

        let network = self.naming.network(stack);
        if self.runtime.find_network(&network).await?.is_none() {
            actions.push(PlannedAction::CreateNetwork { name: network });
        }

        for volume in spec.volume_names() {
            let name = self.naming.volume(stack, &volume);
            let exists = self.runtime.volume_exists(&name).await?;
            actions.push(PlannedAction::EnsureVolume { name, exists });
        }

        let order = ServiceGraph::new(spec.dependencies()).start_order()?;
        let mut desired = HashSet::new();
        for name in &order {
            let Some((service, service_spec)) = spec.services.get_key_value(name.as_str()) else {
                continue;
            };
            let config = container_config(&self.naming, stack, version, service, service_spec);
            desired.insert(config.name.clone());

            let action = match self.runtime.find_container(&config.name).await? {
                None => PlannedAction::CreateContainer {
                    service: service.to_string(),
                    name: config.name,
                },
                Some(existing) => {
                    let observed = self.runtime.inspect_container(&existing.id).await?;
                    match diff(&config, &observed) {
                        Some(drift) => PlannedAction::ReplaceContainer {
                            service: service.to_string(),
                            name: config.name,
                            drift,
                        },
                        None => PlannedAction::KeepContainer {
                            service: service.to_string(),
                            name: config.name,
                        },
                    }
                }
            };
            actions.push(action);
        }

        for orphan in self.stack_containers(stack).await? {
            if !desired.contains(&orphan.name) {
                actions.push(PlannedAction::RemoveOrphan { name: orphan.name });
            }
        }

        Ok(StackPlan {
            stack_id: stack.to_string(),
            version: version.to_string(),
            actions,
        })
    }
}
