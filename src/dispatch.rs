// ABOUTME: Routes a claimed command to the handler registered for its type.
// ABOUTME: Parses the payload and builds the per-command context before running it.

use crate::engine::{CommandContext, EngineError};
use crate::store::{CommandId, CommandStatus, CommandStore, LogLevel};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

pub type Handler =
    Arc<dyn Fn(CommandContext) -> BoxFuture<'static, Result<(), EngineError>> + Send + Sync>;

pub struct Dispatcher {
    store: Arc<dyn CommandStore>,
    handlers: HashMap<String, Handler>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn CommandStore>) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` for `command_type`, replacing any earlier one.
    pub fn register<F, Fut>(&mut self, command_type: &str, handler: F)
    where
        F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EngineError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |ctx| Box::pin(handler(ctx)));
        self.handlers.insert(command_type.to_string(), handler);
    }

    pub fn handles(&self, command_type: &str) -> bool {
        self.handlers.contains_key(command_type)
    }

    /// Run the handler for a `RUNNING` command. Commands that are missing or
    /// in any other status are ignored.
    pub async fn execute(&self, id: CommandId) -> Result<(), EngineError> {
        let Some(command) = self.store.get_command(id).await? else {
            tracing::debug!(command_id = id.0, "Command vanished before execution");
            return Ok(());
        };
        if command.status != CommandStatus::Running {
            tracing::debug!(command_id = id.0, status = %command.status, "Command is not running");
            return Ok(());
        }

        let payload = if command.payload.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str(&command.payload) {
                Ok(payload) => payload,
                Err(e) => {
                    let err = EngineError::Validation(format!("payload is not valid JSON: {e}"));
                    self.store
                        .append_log(id, LogLevel::Error, &err.to_string())
                        .await?;
                    return Err(err);
                }
            }
        };

        let ctx = CommandContext::new(
            id,
            command.stack_id.as_str(),
            command.command_type.as_str(),
            payload,
            self.store.clone(),
        );
        ctx.info(format!(
            "Executing command type={} stackId={}",
            command.command_type, command.stack_id
        ))
        .await;

        let Some(handler) = self.handlers.get(&command.command_type) else {
            ctx.error(format!(
                "No handler registered for command type: {}",
                command.command_type
            ))
            .await;
            return Err(EngineError::Dispatch(format!(
                "No handler for type={}",
                command.command_type
            )));
        };

        handler(ctx).await?;
        self.store
            .append_log(id, LogLevel::Info, "Execution finished")
            .await?;
        tracing::info!(command_id = id.0, "Execution finished");
        Ok(())
    }
}
