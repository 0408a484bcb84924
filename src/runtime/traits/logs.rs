// ABOUTME: Log operations trait for container runtimes.
// ABOUTME: Stream or tail container stdout and stderr.

use super::sealed::Sealed;
use crate::types::ContainerId;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;

pub type LogLineStream = Pin<Box<dyn Stream<Item = Result<LogLine, LogError>> + Send>>;

#[async_trait]
pub trait LogOps: Sealed + Send + Sync {
    /// Stream logs from a container.
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<LogLineStream, LogError>;

    /// Collect the last `lines` lines of a container's output.
    async fn tail_logs(&self, id: &ContainerId, lines: u64) -> Result<Vec<LogLine>, LogError> {
        let mut stream = self.container_logs(id, &LogOptions::tail(lines)).await?;
        let mut collected = Vec::new();
        while let Some(line) = stream.next().await {
            collected.push(line?);
        }
        Ok(collected)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub stdout: bool,
    pub stderr: bool,
    /// Keep the stream open for new output.
    pub follow: bool,
    pub timestamps: bool,
    /// Number of lines from the end; `None` means everything.
    pub tail: Option<u64>,
}

impl LogOptions {
    pub fn tail(n: u64) -> Self {
        Self {
            stdout: true,
            stderr: true,
            follow: false,
            timestamps: false,
            tail: Some(n),
        }
    }

    pub fn follow(mut self) -> Self {
        self.follow = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct LogLine {
    pub content: String,
    pub stream: LogStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
