// ABOUTME: Storage traits for the command queue and for stacks with their versions.
// ABOUTME: Implemented in memory for tests and one-shot use, and durably on SQLite.

mod error;
mod memory;
pub mod model;
mod sqlite;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use model::{
    Command, CommandId, CommandStatus, CommandType, LogEntry, LogLevel, MAX_ERROR_LEN, Stack,
    StackVersion, truncate_error,
};
pub use sqlite::SqliteStore;

use async_trait::async_trait;

/// The durable command queue and its per-command log.
///
/// Only the worker moves commands to `RUNNING`, `DONE` or `FAILED`.
#[async_trait]
pub trait CommandStore: Send + Sync {
    /// Append a `PENDING` command and return its id.
    async fn enqueue(
        &self,
        stack_id: &str,
        command_type: &str,
        payload: &str,
    ) -> Result<CommandId, StoreError>;

    async fn get_command(&self, id: CommandId) -> Result<Option<Command>, StoreError>;

    /// Most recent first, optionally restricted to one stack.
    async fn list_commands(
        &self,
        stack_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Command>, StoreError>;

    /// Cancel a command that has not started. Returns false for any other status.
    async fn cancel_if_pending(&self, id: CommandId) -> Result<bool, StoreError>;

    /// Atomically move the oldest `PENDING` command to `RUNNING`.
    ///
    /// Returns `None` when nothing is pending, when an older command is still
    /// pending or running, or when another claimer won the transition.
    async fn claim_next_pending(&self) -> Result<Option<CommandId>, StoreError>;

    /// `RUNNING` to `DONE`. Returns false if the command was not running.
    async fn mark_done(&self, id: CommandId) -> Result<bool, StoreError>;

    /// `RUNNING` to `FAILED`, storing at most [`MAX_ERROR_LEN`] characters of `message`.
    async fn mark_failed(&self, id: CommandId, message: &str) -> Result<bool, StoreError>;

    async fn append_log(
        &self,
        id: CommandId,
        level: LogLevel,
        message: &str,
    ) -> Result<(), StoreError>;

    /// Most recent first.
    async fn list_logs(&self, id: CommandId, limit: usize) -> Result<Vec<LogEntry>, StoreError>;
}

/// Stacks and their immutable versions.
#[async_trait]
pub trait StackStore: Send + Sync {
    async fn create_stack(&self, stack_id: &str, name: &str) -> Result<Stack, StoreError>;

    async fn get_stack(&self, stack_id: &str) -> Result<Option<Stack>, StoreError>;

    async fn list_stacks(&self) -> Result<Vec<Stack>, StoreError>;

    /// Record the applied version; `None` clears it.
    async fn set_current_version(
        &self,
        stack_id: &str,
        version: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn insert_version(&self, version: &StackVersion) -> Result<(), StoreError>;

    async fn get_version(
        &self,
        stack_id: &str,
        version: &str,
    ) -> Result<Option<StackVersion>, StoreError>;

    /// The most recently inserted version of a stack.
    async fn latest_version(&self, stack_id: &str) -> Result<Option<StackVersion>, StoreError>;

    /// Most recent first.
    async fn list_versions(
        &self,
        stack_id: &str,
        limit: usize,
    ) -> Result<Vec<StackVersion>, StoreError>;
}

/// Both stores behind one handle.
pub trait Store: CommandStore + StackStore {}

impl<T> Store for T where T: CommandStore + StackStore {}
