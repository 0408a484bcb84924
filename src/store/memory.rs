// ABOUTME: In-process store guarded by a single mutex.
// ABOUTME: Each operation holds the lock only for its own duration.

use super::model::{
    Command, CommandId, CommandStatus, LogEntry, LogLevel, Stack, StackVersion, truncate_error,
};
use super::{CommandStore, StackStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;

#[derive(Default)]
struct Inner {
    next_id: i64,
    commands: BTreeMap<CommandId, Command>,
    logs: Vec<LogEntry>,
    stacks: BTreeMap<String, Stack>,
    /// In insertion order; the last entry for a stack is its latest.
    versions: Vec<StackVersion>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommandStore for MemoryStore {
    async fn enqueue(
        &self,
        stack_id: &str,
        command_type: &str,
        payload: &str,
    ) -> Result<CommandId, StoreError> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = CommandId(inner.next_id);
        inner.commands.insert(
            id,
            Command {
                id,
                stack_id: stack_id.to_string(),
                command_type: command_type.to_string(),
                payload: payload.to_string(),
                status: CommandStatus::Pending,
                created_at: Utc::now(),
                started_at: None,
                ended_at: None,
                error: None,
            },
        );
        Ok(id)
    }

    async fn get_command(&self, id: CommandId) -> Result<Option<Command>, StoreError> {
        Ok(self.inner.lock().commands.get(&id).cloned())
    }

    async fn list_commands(
        &self,
        stack_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Command>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .commands
            .values()
            .rev()
            .filter(|c| stack_id.is_none_or(|s| c.stack_id == s))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn cancel_if_pending(&self, id: CommandId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        match inner.commands.get_mut(&id) {
            Some(cmd) if cmd.status == CommandStatus::Pending => {
                cmd.status = CommandStatus::Cancelled;
                cmd.ended_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn claim_next_pending(&self) -> Result<Option<CommandId>, StoreError> {
        let mut inner = self.inner.lock();

        let Some(id) = inner
            .commands
            .values()
            .find(|c| c.status == CommandStatus::Pending)
            .map(|c| c.id)
        else {
            return Ok(None);
        };

        let blocked = inner.commands.range(..id).any(|(_, c)| {
            matches!(c.status, CommandStatus::Pending | CommandStatus::Running)
        });
        if blocked {
            return Ok(None);
        }

        match inner.commands.get_mut(&id) {
            Some(cmd) if cmd.status == CommandStatus::Pending => {
                cmd.status = CommandStatus::Running;
                cmd.started_at = Some(Utc::now());
                Ok(Some(id))
            }
            _ => Ok(None),
        }
    }

    async fn mark_done(&self, id: CommandId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        match inner.commands.get_mut(&id) {
            Some(cmd) if cmd.status == CommandStatus::Running => {
                cmd.status = CommandStatus::Done;
                cmd.ended_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_failed(&self, id: CommandId, message: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        match inner.commands.get_mut(&id) {
            Some(cmd) if cmd.status == CommandStatus::Running => {
                cmd.status = CommandStatus::Failed;
                cmd.ended_at = Some(Utc::now());
                cmd.error = Some(truncate_error(message));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn append_log(
        &self,
        id: CommandId,
        level: LogLevel,
        message: &str,
    ) -> Result<(), StoreError> {
        self.inner.lock().logs.push(LogEntry {
            command_id: id,
            ts: Utc::now(),
            level,
            message: message.to_string(),
        });
        Ok(())
    }

    async fn list_logs(&self, id: CommandId, limit: usize) -> Result<Vec<LogEntry>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .logs
            .iter()
            .rev()
            .filter(|l| l.command_id == id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StackStore for MemoryStore {
    async fn create_stack(&self, stack_id: &str, name: &str) -> Result<Stack, StoreError> {
        let mut inner = self.inner.lock();
        if inner.stacks.contains_key(stack_id) {
            return Err(StoreError::StackExists(stack_id.to_string()));
        }
        let stack = Stack {
            stack_id: stack_id.to_string(),
            name: name.to_string(),
            current_version: None,
            created_at: Utc::now(),
        };
        inner.stacks.insert(stack_id.to_string(), stack.clone());
        Ok(stack)
    }

    async fn get_stack(&self, stack_id: &str) -> Result<Option<Stack>, StoreError> {
        Ok(self.inner.lock().stacks.get(stack_id).cloned())
    }

    async fn list_stacks(&self) -> Result<Vec<Stack>, StoreError> {
        Ok(self.inner.lock().stacks.values().cloned().collect())
    }

    async fn set_current_version(
        &self,
        stack_id: &str,
        version: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let stack = inner
            .stacks
            .get_mut(stack_id)
            .ok_or_else(|| StoreError::StackNotFound(stack_id.to_string()))?;
        stack.current_version = version.map(str::to_string);
        Ok(())
    }

    async fn insert_version(&self, version: &StackVersion) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.stacks.contains_key(&version.stack_id) {
            return Err(StoreError::StackNotFound(version.stack_id.clone()));
        }
        let exists = inner
            .versions
            .iter()
            .any(|v| v.stack_id == version.stack_id && v.version == version.version);
        if exists {
            return Err(StoreError::VersionExists {
                stack_id: version.stack_id.clone(),
                version: version.version.clone(),
            });
        }
        inner.versions.push(version.clone());
        Ok(())
    }

    async fn get_version(
        &self,
        stack_id: &str,
        version: &str,
    ) -> Result<Option<StackVersion>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .versions
            .iter()
            .find(|v| v.stack_id == stack_id && v.version == version)
            .cloned())
    }

    async fn latest_version(&self, stack_id: &str) -> Result<Option<StackVersion>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .versions
            .iter()
            .rev()
            .find(|v| v.stack_id == stack_id)
            .cloned())
    }

    async fn list_versions(
        &self,
        stack_id: &str,
        limit: usize,
    ) -> Result<Vec<StackVersion>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .versions
            .iter()
            .rev()
            .filter(|v| v.stack_id == stack_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
