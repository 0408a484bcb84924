// ABOUTME: Delete: tear down every runtime object belonging to a stack.
// ABOUTME: Containers first, then the network, then the volumes they mounted.

use super::{CommandContext, Engine, EngineError};
use crate::runtime::{ContainerError, FullRuntime};
use std::collections::BTreeSet;

impl<R: FullRuntime> Engine<R> {
    /// `DELETE_STACK`. Stored versions are kept; only the applied version is cleared.
    pub async fn delete(&self, ctx: &CommandContext) -> Result<(), EngineError> {
        let stack = ctx.stack().await?;
        let containers = self.stack_containers(&stack).await?;
        ctx.info(format!(
            "Deleting stack {stack} ({} containers)",
            containers.len()
        ))
        .await;

        let mut volumes = BTreeSet::new();
        for container in &containers {
            match self.runtime.inspect_container(&container.id).await {
                Ok(info) => volumes.extend(info.mounts.into_iter().map(|m| m.volume)),
                Err(e) => {
                    ctx.warn(format!("Inspect of {} failed: {e}", container.name))
                        .await
                }
            }
        }

        for container in &containers {
            self.stop_best_effort(ctx, container).await;
            match self.runtime.remove_container(&container.id, true).await {
                Ok(()) | Err(ContainerError::NotFound(_)) => {
                    ctx.info(format!("Removed container {}", container.name))
                        .await
                }
                Err(e) => return Err(e.into()),
            }
        }

        let network = self.naming.network(&stack);
        if let Some(id) = self.runtime.find_network(&network).await? {
            self.runtime.remove_network(&id).await?;
            ctx.info(format!("Removed network {network}")).await;
        }

        for volume in &volumes {
            match self.runtime.remove_volume(volume, false).await {
                Ok(()) => ctx.info(format!("Removed volume {volume}")).await,
                Err(e) => ctx.warn(format!("Removal of volume {volume} failed: {e}")).await,
            }
        }

        self.stacks.set_current_version(stack.as_str(), None).await?;
        ctx.info(format!("Stack {stack} deleted")).await;
        Ok(())
    }
}
