// ABOUTME: Enqueues stack intents as commands and answers command queries.
// ABOUTME: Refuses intents for unknown stacks; only pending commands can be cancelled.

use super::ServiceError;
use crate::store::{
    Command, CommandId, CommandStore, CommandType, LogEntry, StackStore, Store,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

/// Command log lines returned when the caller gives no limit.
pub const DEFAULT_PAGE_SIZE: usize = 200;

/// Payload of a `DEPLOY_APP` command.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    pub target_service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

pub struct CommandService {
    commands: Arc<dyn CommandStore>,
    stacks: Arc<dyn StackStore>,
    page_size: usize,
}

impl CommandService {
    pub fn new<S: Store + 'static>(store: Arc<S>) -> Self {
        Self {
            commands: store.clone(),
            stacks: store,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub async fn enqueue(
        &self,
        stack_id: &str,
        command_type: CommandType,
        payload: Value,
    ) -> Result<CommandId, ServiceError> {
        if self.stacks.get_stack(stack_id).await?.is_none() {
            return Err(ServiceError::StackNotFound(stack_id.to_string()));
        }
        let id = self
            .commands
            .enqueue(stack_id, command_type.as_str(), &payload.to_string())
            .await?;
        tracing::info!(command_id = id.0, stack = stack_id, command_type = %command_type, "Command enqueued");
        Ok(id)
    }

    pub async fn apply(&self, stack_id: &str, version: &str) -> Result<CommandId, ServiceError> {
        self.enqueue(
            stack_id,
            CommandType::ApplyStackVersion,
            json!({ "version": version }),
        )
        .await
    }

    pub async fn start(&self, stack_id: &str) -> Result<CommandId, ServiceError> {
        self.enqueue(stack_id, CommandType::StartStack, json!({}))
            .await
    }

    pub async fn stop(&self, stack_id: &str) -> Result<CommandId, ServiceError> {
        self.enqueue(stack_id, CommandType::StopStack, json!({}))
            .await
    }

    pub async fn restart(&self, stack_id: &str) -> Result<CommandId, ServiceError> {
        self.enqueue(stack_id, CommandType::RestartStack, json!({}))
            .await
    }

    pub async fn delete(&self, stack_id: &str) -> Result<CommandId, ServiceError> {
        self.enqueue(stack_id, CommandType::DeleteStack, json!({}))
            .await
    }

    pub async fn rollback(
        &self,
        stack_id: &str,
        target_version: &str,
    ) -> Result<CommandId, ServiceError> {
        self.enqueue(
            stack_id,
            CommandType::RollbackStack,
            json!({ "targetVersion": target_version }),
        )
        .await
    }

    pub async fn deploy(
        &self,
        stack_id: &str,
        request: &DeployRequest,
    ) -> Result<CommandId, ServiceError> {
        let payload = serde_json::to_value(request).unwrap_or_else(|_| json!({}));
        self.enqueue(stack_id, CommandType::DeployApp, payload).await
    }

    /// True if the command was pending and is now cancelled.
    pub async fn cancel(&self, id: CommandId) -> Result<bool, ServiceError> {
        let cancelled = self.commands.cancel_if_pending(id).await?;
        if cancelled {
            tracing::info!(command_id = id.0, "Command cancelled");
        }
        Ok(cancelled)
    }

    pub async fn get(&self, id: CommandId) -> Result<Option<Command>, ServiceError> {
        Ok(self.commands.get_command(id).await?)
    }

    /// Most recent first.
    pub async fn list(
        &self,
        stack_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Command>, ServiceError> {
        Ok(self.commands.list_commands(stack_id, limit).await?)
    }

    /// Most recent first; `None` uses the configured page size.
    pub async fn logs(
        &self,
        id: CommandId,
        limit: Option<usize>,
    ) -> Result<Vec<LogEntry>, ServiceError> {
        let limit = limit.unwrap_or(self.page_size);
        Ok(self.commands.list_logs(id, limit).await?)
    }
}
