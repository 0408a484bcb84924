// ABOUTME: Apply and rollback: converge a stack onto one stored version.
// ABOUTME: Pulls, creates or replaces containers in dependency order, then removes orphans.

use super::{CommandContext, Engine, EngineError};
use crate::runtime::{ContainerConfig, FullRuntime, ImageError};
use crate::stack::{ServiceGraph, StackSpec, container_config, diff};
use crate::types::{ImageRef, StackId};
use std::collections::HashSet;

impl<R: FullRuntime> Engine<R> {
    /// `APPLY_STACK_VERSION`: payload `{"version": "..."}`.
    pub async fn apply(&self, ctx: &CommandContext) -> Result<(), EngineError> {
        let version = ctx.required_str("version").await?;
        let stack = ctx.stack().await?;
        self.converge(ctx, &stack, &version).await
    }

    /// `ROLLBACK_STACK`: payload `{"targetVersion": "..."}`.
    pub async fn rollback(&self, ctx: &CommandContext) -> Result<(), EngineError> {
        let target = ctx.required_str("targetVersion").await?;
        let stack = ctx.stack().await?;
        // Fails with NotFound before anything on the runtime is touched.
        self.load_version(ctx, &stack, &target).await?;
        ctx.info(format!("Rolling back stack {stack} to {target}"))
            .await;
        self.converge(ctx, &stack, &target).await
    }

    pub(super) async fn converge(
        &self,
        ctx: &CommandContext,
        stack: &StackId,
        version: &str,
    ) -> Result<(), EngineError> {
        let record = self.load_version(ctx, stack, version).await?;
        let spec = StackSpec::from_json_str(&record.body)?;
        ctx.info(format!(
            "Applying version {version} ({} services)",
            spec.services.len()
        ))
        .await;

        self.ensure_network(ctx, stack, version).await?;
        for volume in spec.volume_names() {
            self.ensure_volume(ctx, stack, version, &volume).await?;
        }

        let order = ServiceGraph::new(spec.dependencies()).start_order()?;
        let existing = self.stack_containers(stack).await?;

        let mut desired = HashSet::new();
        for name in &order {
            let Some((service, service_spec)) = spec.services.get_key_value(name.as_str()) else {
                ctx.warn(format!("Dependency {name} is not a declared service; skipping"))
                    .await;
                continue;
            };
            self.pull(ctx, &service_spec.image).await?;
            let config = container_config(&self.naming, stack, version, service, service_spec);
            desired.insert(config.name.clone());
            self.converge_service(ctx, &config).await?;
        }

        for orphan in existing.iter().filter(|c| !desired.contains(&c.name)) {
            ctx.warn(format!("Removing orphan container {}", orphan.name))
                .await;
            self.stop_best_effort(ctx, orphan).await;
            self.runtime.remove_container(&orphan.id, true).await?;
        }

        self.stacks
            .set_current_version(stack.as_str(), Some(version))
            .await?;
        ctx.info(format!("Stack {stack} converged to version {version}"))
            .await;
        Ok(())
    }

    async fn pull(&self, ctx: &CommandContext, image: &ImageRef) -> Result<(), EngineError> {
        ctx.info(format!("Pulling {image}")).await;
        let timeout = self.timeouts.pull;
        match tokio::time::timeout(timeout, self.runtime.pull_image(image)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ImageError::Timeout {
                image: image.to_string(),
                timeout,
            }
            .into()),
        }
    }

    async fn converge_service(
        &self,
        ctx: &CommandContext,
        config: &ContainerConfig,
    ) -> Result<(), EngineError> {
        let Some(existing) = self.runtime.find_container(&config.name).await? else {
            return self.create_and_start(ctx, config).await;
        };

        let observed = self.runtime.inspect_container(&existing.id).await?;
        match diff(config, &observed) {
            Some(drift) => {
                ctx.warn(format!(
                    "Replacing container due to drift ({drift}): {}",
                    config.name
                ))
                .await;
                self.stop_best_effort(ctx, &existing).await;
                self.runtime.remove_container(&existing.id, true).await?;
                self.create_and_start(ctx, config).await
            }
            None => {
                ctx.info(format!("No drift; ensuring running: {}", config.name))
                    .await;
                self.ensure_started(ctx, &existing).await
            }
        }
    }

    async fn create_and_start(
        &self,
        ctx: &CommandContext,
        config: &ContainerConfig,
    ) -> Result<(), EngineError> {
        let id = self.runtime.create_container(config).await?;
        ctx.info(format!("Created container {}", config.name)).await;
        self.runtime.start_container(&id).await?;
        ctx.info(format!("Started {}", config.name)).await;
        Ok(())
    }
}
