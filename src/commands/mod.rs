// ABOUTME: Command implementations for the stackyard CLI.
// ABOUTME: Shares config, output mode and lazily opened store/runtime handles.

mod queue;
mod runtime;
mod stacks;

pub use queue::{Intent, cancel, enqueue, list_commands, show_command, show_logs};
pub use runtime::{container_logs, plan, status, worker};
pub use stacks::{
    stack_create, stack_list, stack_show, version_create, version_list, version_show,
};

use stackyard::config::Config;
use stackyard::error::{Error, Result};
use stackyard::output::Output;
use stackyard::runtime::{self as rt, BollardRuntime};
use stackyard::service::{CommandService, VersionService};
use stackyard::store::SqliteStore;
use std::sync::Arc;

/// Everything a CLI command needs.
pub struct App {
    pub config: Config,
    pub output: Output,
}

impl App {
    pub fn new(config: Config, output: Output) -> Self {
        Self { config, output }
    }

    pub async fn store(&self) -> Result<Arc<SqliteStore>> {
        Ok(Arc::new(SqliteStore::open(&self.config.database).await?))
    }

    pub async fn commands(&self) -> Result<CommandService> {
        let store = self.store().await?;
        Ok(CommandService::new(store).with_page_size(self.config.logs.page_size))
    }

    pub async fn versions(&self) -> Result<VersionService> {
        let store = self.store().await?;
        Ok(VersionService::new(store))
    }

    pub async fn runtime(&self) -> Result<Arc<BollardRuntime>> {
        let runtime = rt::connect(&self.config.runtime).await?;
        tracing::debug!(runtime = %runtime.runtime_type(), "Connected to container runtime");
        Ok(Arc::new(runtime))
    }

    /// The given version, or the stack's latest one.
    pub async fn resolve_version(&self, stack: &str, version: Option<String>) -> Result<String> {
        if let Some(version) = version {
            return Ok(version);
        }
        match self.versions().await?.latest_version(stack).await? {
            Some(latest) => Ok(latest.version),
            None => Err(Error::InvalidInput(format!("stack {stack} has no versions"))),
        }
    }
}
