// ABOUTME: Start, stop and restart of a stack's existing containers.
// ABOUTME: Ordered by the applied version's dependency graph when one is known.

use super::{CommandContext, Engine, EngineError};
use crate::runtime::{ContainerError, ContainerSummary, FullRuntime};
use crate::types::StackId;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Start,
    Stop,
}

impl<R: FullRuntime> Engine<R> {
    /// `START_STACK`.
    pub async fn start(&self, ctx: &CommandContext) -> Result<(), EngineError> {
        let stack = ctx.stack().await?;
        self.start_stack(ctx, &stack).await
    }

    /// `STOP_STACK`.
    pub async fn stop(&self, ctx: &CommandContext) -> Result<(), EngineError> {
        let stack = ctx.stack().await?;
        self.stop_stack(ctx, &stack).await
    }

    /// `RESTART_STACK`: a full stop followed by a full start.
    pub async fn restart(&self, ctx: &CommandContext) -> Result<(), EngineError> {
        let stack = ctx.stack().await?;
        ctx.info("Restart: stop then start").await;
        self.stop_stack(ctx, &stack).await?;
        self.start_stack(ctx, &stack).await
    }

    async fn start_stack(&self, ctx: &CommandContext, stack: &StackId) -> Result<(), EngineError> {
        let containers = self.ordered(ctx, stack, Direction::Start).await?;
        for container in &containers {
            self.ensure_started(ctx, container).await?;
        }
        ctx.info(format!(
            "Stack {stack} started ({} containers)",
            containers.len()
        ))
        .await;
        Ok(())
    }

    async fn stop_stack(&self, ctx: &CommandContext, stack: &StackId) -> Result<(), EngineError> {
        let containers = self.ordered(ctx, stack, Direction::Stop).await?;
        for container in &containers {
            match self
                .runtime
                .stop_container(&container.id, self.timeouts.stop)
                .await
            {
                Ok(()) => ctx.info(format!("Stopped {}", container.name)).await,
                Err(ContainerError::NotRunning(_) | ContainerError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        ctx.info(format!(
            "Stack {stack} stopped ({} containers)",
            containers.len()
        ))
        .await;
        Ok(())
    }

    /// The stack's containers: services in dependency order first (reversed
    /// for stop), then any labeled container the order does not cover.
    async fn ordered(
        &self,
        ctx: &CommandContext,
        stack: &StackId,
        direction: Direction,
    ) -> Result<Vec<ContainerSummary>, EngineError> {
        let mut remaining = self.stack_containers(stack).await?;
        let Some(mut order) = self.applied_order(ctx, stack).await? else {
            ctx.warn("No applied version; acting on all stack containers")
                .await;
            return Ok(remaining);
        };
        if direction == Direction::Stop {
            order.reverse();
        }

        let mut ordered = Vec::with_capacity(remaining.len());
        for service in &order {
            let name = self.naming.container(stack, service);
            if let Some(pos) = remaining.iter().position(|c| c.name == name) {
                ordered.push(remaining.remove(pos));
            }
        }
        ordered.extend(remaining);
        Ok(ordered)
    }
}
