// ABOUTME: Persistent records: commands, command logs, stacks and stack versions.
// ABOUTME: Includes command status and type enums with their wire strings.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Longest error message stored on a command row.
pub const MAX_ERROR_LEN: usize = 2000;

/// Cut `message` to at most [`MAX_ERROR_LEN`] characters.
pub fn truncate_error(message: &str) -> String {
    match message.char_indices().nth(MAX_ERROR_LEN) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

/// Queue position of a command. Strictly increasing in enqueue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CommandId(pub i64);

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for CommandId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(CommandId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    Pending,
    Running,
    Done,
    Failed,
    Cancelled,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Pending => "PENDING",
            CommandStatus::Running => "RUNNING",
            CommandStatus::Done => "DONE",
            CommandStatus::Failed => "FAILED",
            CommandStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value {0:?}")]
pub struct UnknownValue(pub String);

impl FromStr for CommandStatus {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(CommandStatus::Pending),
            "RUNNING" => Ok(CommandStatus::Running),
            "DONE" => Ok(CommandStatus::Done),
            "FAILED" => Ok(CommandStatus::Failed),
            "CANCELLED" => Ok(CommandStatus::Cancelled),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

/// Known command types. Commands store the type as a free string so an
/// unknown type can be queued and then fail at dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    ApplyStackVersion,
    StartStack,
    StopStack,
    RestartStack,
    DeleteStack,
    RollbackStack,
    DeployApp,
}

impl CommandType {
    pub const ALL: [CommandType; 7] = [
        CommandType::ApplyStackVersion,
        CommandType::StartStack,
        CommandType::StopStack,
        CommandType::RestartStack,
        CommandType::DeleteStack,
        CommandType::RollbackStack,
        CommandType::DeployApp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::ApplyStackVersion => "APPLY_STACK_VERSION",
            CommandType::StartStack => "START_STACK",
            CommandType::StopStack => "STOP_STACK",
            CommandType::RestartStack => "RESTART_STACK",
            CommandType::DeleteStack => "DELETE_STACK",
            CommandType::RollbackStack => "ROLLBACK_STACK",
            CommandType::DeployApp => "DEPLOY_APP",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for CommandType {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownValue(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    pub id: CommandId,
    pub stack_id: String,
    pub command_type: String,
    /// JSON text; parsed at dispatch.
    pub payload: String,
    pub status: CommandStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub command_id: CommandId,
    pub ts: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stack {
    pub stack_id: String,
    pub name: String,
    pub current_version: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An immutable snapshot of a stack body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackVersion {
    pub stack_id: String,
    pub version: String,
    pub parent_version: Option<String>,
    /// Canonical JSON with sorted keys.
    pub body: String,
    /// SHA-256 of `body`, lowercase hex.
    pub hash: String,
    pub created_by: String,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}
