// ABOUTME: Convergence engine: drives a stack's runtime state toward a declared version.
// ABOUTME: Holds the runtime, stack store, naming and timeouts shared by every handler.

mod apply;
mod context;
mod delete;
mod deploy;
mod error;
mod lifecycle;
mod plan;

pub use context::CommandContext;
pub use error::{EngineError, EngineErrorKind};
pub use plan::{PlannedAction, StackPlan};

use crate::config::Timeouts;
use crate::dispatch::Dispatcher;
use crate::runtime::{ContainerError, ContainerSummary, FullRuntime, NetworkConfig, VolumeConfig};
use crate::stack::{NETWORK_ROLE, Naming, StackSpec, VOLUME_ROLE};
use crate::store::{CommandType, StackStore, StackVersion};
use crate::types::{NetworkId, StackId};
use std::sync::Arc;

pub struct Engine<R> {
    runtime: Arc<R>,
    stacks: Arc<dyn StackStore>,
    naming: Naming,
    timeouts: Timeouts,
}

impl<R: FullRuntime> Engine<R> {
    pub fn new(
        runtime: Arc<R>,
        stacks: Arc<dyn StackStore>,
        naming: Naming,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            runtime,
            stacks,
            naming,
            timeouts,
        }
    }

    pub fn naming(&self) -> &Naming {
        &self.naming
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    async fn load_version(
        &self,
        ctx: &CommandContext,
        stack: &StackId,
        version: &str,
    ) -> Result<StackVersion, EngineError> {
        match self.stacks.get_version(stack.as_str(), version).await? {
            Some(record) => Ok(record),
            None => Err(ctx
                .fail(EngineError::NotFound(format!(
                    "version {version} not found for stack {stack}"
                )))
                .await),
        }
    }

    async fn ensure_network(
        &self,
        ctx: &CommandContext,
        stack: &StackId,
        version: &str,
    ) -> Result<NetworkId, EngineError> {
        let name = self.naming.network(stack);
        if let Some(id) = self.runtime.find_network(&name).await? {
            ctx.info(format!("Network {name} exists")).await;
            return Ok(id);
        }

        let config = NetworkConfig {
            name: name.clone(),
            driver: None,
            labels: self.naming.labels(stack, Some(version), Some(NETWORK_ROLE)),
        };
        let id = self.runtime.create_network(&config).await?;
        ctx.info(format!("Created network {name}")).await;
        Ok(id)
    }

    async fn ensure_volume(
        &self,
        ctx: &CommandContext,
        stack: &StackId,
        version: &str,
        volume: &str,
    ) -> Result<(), EngineError> {
        let name = self.naming.volume(stack, volume);
        if self.runtime.volume_exists(&name).await? {
            return Ok(());
        }
        let config = VolumeConfig {
            name: name.clone(),
            labels: self.naming.labels(stack, Some(version), Some(VOLUME_ROLE)),
        };
        self.runtime.create_volume(&config).await?;
        ctx.info(format!("Created volume {name}")).await;
        Ok(())
    }

    /// All containers carrying the stack label, sorted by name.
    async fn stack_containers(
        &self,
        stack: &StackId,
    ) -> Result<Vec<ContainerSummary>, EngineError> {
        Ok(self
            .runtime
            .list_containers(&self.naming.stack_filter(stack))
            .await?)
    }

    /// Start a container, treating "already running" as success.
    async fn ensure_started(
        &self,
        ctx: &CommandContext,
        container: &ContainerSummary,
    ) -> Result<(), EngineError> {
        match self.runtime.start_container(&container.id).await {
            Ok(()) => {
                ctx.info(format!("Started {}", container.name)).await;
                Ok(())
            }
            Err(ContainerError::AlreadyRunning(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Stop a container. Anything other than success is logged and ignored.
    async fn stop_best_effort(&self, ctx: &CommandContext, container: &ContainerSummary) {
        match self
            .runtime
            .stop_container(&container.id, self.timeouts.stop)
            .await
        {
            Ok(()) | Err(ContainerError::NotRunning(_)) => {}
            Err(e) => {
                ctx.warn(format!("Stop of {} failed: {e}", container.name))
                    .await
            }
        }
    }

    /// Service start order for the stack's applied version, or `None` when
    /// there is no applied version to order by.
    async fn applied_order(
        &self,
        ctx: &CommandContext,
        stack: &StackId,
    ) -> Result<Option<Vec<String>>, EngineError> {
        let Some(record) = self.stacks.get_stack(stack.as_str()).await? else {
            return Err(ctx
                .fail(EngineError::NotFound(format!("stack {stack} not found")))
                .await);
        };
        let Some(version) = record.current_version else {
            return Ok(None);
        };
        let Some(version) = self.stacks.get_version(stack.as_str(), &version).await? else {
            ctx.warn(format!("Applied version {version} is missing from the store"))
                .await;
            return Ok(None);
        };
        let spec = StackSpec::from_json_str(&version.body)?;
        let order = crate::stack::ServiceGraph::new(spec.dependencies()).start_order()?;
        Ok(Some(order))
    }
}

/// Register every command type with a handler backed by `engine`.
pub fn register_handlers<R>(dispatcher: &mut Dispatcher, engine: Arc<Engine<R>>)
where
    R: FullRuntime + 'static,
{
    for command_type in CommandType::ALL {
        let engine = engine.clone();
        dispatcher.register(command_type.as_str(), move |ctx: CommandContext| {
            let engine = engine.clone();
            async move {
                match command_type {
                    CommandType::ApplyStackVersion => engine.apply(&ctx).await,
                    CommandType::StartStack => engine.start(&ctx).await,
                    CommandType::StopStack => engine.stop(&ctx).await,
                    CommandType::RestartStack => engine.restart(&ctx).await,
                    CommandType::DeleteStack => engine.delete(&ctx).await,
                    CommandType::RollbackStack => engine.rollback(&ctx).await,
                    CommandType::DeployApp => engine.deploy(&ctx).await,
                }
            }
        });
    }
}
