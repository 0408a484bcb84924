// ABOUTME: Per-command execution context handed to every handler.
// ABOUTME: Carries the parsed payload and writes log lines to the command's log.

use super::error::EngineError;
use crate::store::{CommandId, CommandStore, LogLevel};
use crate::types::StackId;
use serde_json::Value;
use std::sync::Arc;

pub struct CommandContext {
    pub command_id: CommandId,
    pub stack_id: String,
    pub command_type: String,
    pub payload: Value,
    log: Arc<dyn CommandStore>,
}

impl CommandContext {
    pub fn new(
        command_id: CommandId,
        stack_id: impl Into<String>,
        command_type: impl Into<String>,
        payload: Value,
        log: Arc<dyn CommandStore>,
    ) -> Self {
        Self {
            command_id,
            stack_id: stack_id.into(),
            command_type: command_type.into(),
            payload,
            log,
        }
    }

    /// Append a line to the command log and mirror it to tracing. A failed
    /// write is reported but never fails the command.
    pub async fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        let message = message.as_ref();
        let id = self.command_id.0;
        let stack = self.stack_id.as_str();
        match level {
            LogLevel::Debug => tracing::debug!(command_id = id, stack, "{message}"),
            LogLevel::Info => tracing::info!(command_id = id, stack, "{message}"),
            LogLevel::Warn => tracing::warn!(command_id = id, stack, "{message}"),
            LogLevel::Error => tracing::error!(command_id = id, stack, "{message}"),
        }
        if let Err(e) = self.log.append_log(self.command_id, level, message).await {
            tracing::warn!(command_id = id, error = %e, "Failed to persist command log line");
        }
    }

    pub async fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message).await;
    }

    pub async fn warn(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, message).await;
    }

    pub async fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message).await;
    }

    /// Log `err` at ERROR and hand it back for propagation.
    pub async fn fail(&self, err: EngineError) -> EngineError {
        self.error(err.to_string()).await;
        err
    }

    pub async fn stack(&self) -> Result<StackId, EngineError> {
        match StackId::new(&self.stack_id) {
            Ok(id) => Ok(id),
            Err(e) => Err(self.fail(EngineError::Validation(e.to_string())).await),
        }
    }

    /// A required, non-blank string field of the payload.
    pub async fn required_str(&self, field: &str) -> Result<String, EngineError> {
        match self.optional_str(field) {
            Some(value) => Ok(value),
            None => Err(self
                .fail(EngineError::Validation(format!(
                    "payload.{field} is required"
                )))
                .await),
        }
    }

    pub fn optional_str(&self, field: &str) -> Option<String> {
        self.payload
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}
