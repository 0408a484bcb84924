// ABOUTME: SQLite-backed store using sqlx with embedded migrations.
// ABOUTME: The claim runs inside one transaction with a conditional status update.

use super::model::{
    Command, CommandId, CommandStatus, LogEntry, LogLevel, Stack, StackVersion, truncate_error,
};
use super::{CommandStore, StackStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::Path;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct CommandRow {
    id: i64,
    stack_id: String,
    command_type: String,
    payload: String,
    status: String,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    error: Option<String>,
}

impl TryFrom<CommandRow> for Command {
    type Error = StoreError;

    fn try_from(row: CommandRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<CommandStatus>()
            .map_err(|e| StoreError::Corrupt(format!("command {}: status {e}", row.id)))?;
        Ok(Command {
            id: CommandId(row.id),
            stack_id: row.stack_id,
            command_type: row.command_type,
            payload: row.payload,
            status,
            created_at: row.created_at,
            started_at: row.started_at,
            ended_at: row.ended_at,
            error: row.error,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LogRow {
    command_id: i64,
    ts: DateTime<Utc>,
    level: String,
    message: String,
}

impl TryFrom<LogRow> for LogEntry {
    type Error = StoreError;

    fn try_from(row: LogRow) -> Result<Self, Self::Error> {
        let level = row
            .level
            .parse::<LogLevel>()
            .map_err(|e| StoreError::Corrupt(format!("log level {e}")))?;
        Ok(LogEntry {
            command_id: CommandId(row.command_id),
            ts: row.ts,
            level,
            message: row.message,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StackRow {
    stack_id: String,
    name: String,
    current_version: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<StackRow> for Stack {
    fn from(row: StackRow) -> Self {
        Stack {
            stack_id: row.stack_id,
            name: row.name,
            current_version: row.current_version,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VersionRow {
    stack_id: String,
    version: String,
    parent_version: Option<String>,
    body: String,
    hash: String,
    created_by: String,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<VersionRow> for StackVersion {
    fn from(row: VersionRow) -> Self {
        StackVersion {
            stack_id: row.stack_id,
            version: row.version,
            parent_version: row.parent_version,
            body: row.body,
            hash: row.hash,
            created_by: row.created_by,
            comment: row.comment,
            created_at: row.created_at,
        }
    }
}

const COMMAND_COLUMNS: &str =
    "id, stack_id, command_type, payload, status, created_at, started_at, ended_at, error";

const VERSION_COLUMNS: &str =
    "stack_id, version, parent_version, body, hash, created_by, comment, created_at";

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `path` and run migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;
        MIGRATOR.run(&pool).await?;
        tracing::debug!(path = %path.display(), "Opened SQLite store");

        Ok(Self { pool })
    }

    /// A private in-memory database. One connection, so every query sees it.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        MIGRATOR.run(&pool).await?;
        Ok(Self { pool })
    }

    /// Move a running command to a terminal status.
    async fn finish(
        &self,
        id: CommandId,
        status: CommandStatus,
        error: Option<String>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE commands
            SET status = ?, ended_at = ?, error = ?
            WHERE id = ? AND status = 'RUNNING'
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(error)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl CommandStore for SqliteStore {
    async fn enqueue(
        &self,
        stack_id: &str,
        command_type: &str,
        payload: &str,
    ) -> Result<CommandId, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO commands (stack_id, command_type, payload, status, created_at)
            VALUES (?, ?, ?, 'PENDING', ?)
            "#,
        )
        .bind(stack_id)
        .bind(command_type)
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(CommandId(result.last_insert_rowid()))
    }

    async fn get_command(&self, id: CommandId) -> Result<Option<Command>, StoreError> {
        let sql = format!("SELECT {COMMAND_COLUMNS} FROM commands WHERE id = ?");
        sqlx::query_as::<_, CommandRow>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .map(Command::try_from)
            .transpose()
    }

    async fn list_commands(
        &self,
        stack_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Command>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = match stack_id {
            Some(stack_id) => {
                let sql = format!(
                    "SELECT {COMMAND_COLUMNS} FROM commands WHERE stack_id = ? ORDER BY id DESC LIMIT ?"
                );
                sqlx::query_as::<_, CommandRow>(&sql)
                    .bind(stack_id)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("SELECT {COMMAND_COLUMNS} FROM commands ORDER BY id DESC LIMIT ?");
                sqlx::query_as::<_, CommandRow>(&sql)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.into_iter().map(Command::try_from).collect()
    }

    async fn cancel_if_pending(&self, id: CommandId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE commands
            SET status = 'CANCELLED', ended_at = ?
            WHERE id = ? AND status = 'PENDING'
            "#,
        )
        .bind(Utc::now())
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn claim_next_pending(&self) -> Result<Option<CommandId>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let next: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM commands WHERE status = 'PENDING' ORDER BY id ASC LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?;
        let Some((id,)) = next else {
            tx.rollback().await?;
            return Ok(None);
        };

        let (older,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM commands WHERE id < ? AND status IN ('PENDING', 'RUNNING')",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if older > 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let updated = sqlx::query(
            r#"
            UPDATE commands
            SET status = 'RUNNING', started_at = ?
            WHERE id = ? AND status = 'PENDING'
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((updated.rows_affected() == 1).then_some(CommandId(id)))
    }

    async fn mark_done(&self, id: CommandId) -> Result<bool, StoreError> {
        self.finish(id, CommandStatus::Done, None).await
    }

    async fn mark_failed(&self, id: CommandId, message: &str) -> Result<bool, StoreError> {
        self.finish(id, CommandStatus::Failed, Some(truncate_error(message)))
            .await
    }

    async fn append_log(
        &self,
        id: CommandId,
        level: LogLevel,
        message: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO command_logs (command_id, ts, level, message) VALUES (?, ?, ?, ?)")
            .bind(id.0)
            .bind(Utc::now())
            .bind(level.as_str())
            .bind(message)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_logs(&self, id: CommandId, limit: usize) -> Result<Vec<LogEntry>, StoreError> {
        let rows = sqlx::query_as::<_, LogRow>(
            r#"
            SELECT command_id, ts, level, message
            FROM command_logs
            WHERE command_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(id.0)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LogEntry::try_from).collect()
    }
}

#[async_trait]
impl StackStore for SqliteStore {
    async fn create_stack(&self, stack_id: &str, name: &str) -> Result<Stack, StoreError> {
        let stack = Stack {
            stack_id: stack_id.to_string(),
            name: name.to_string(),
            current_version: None,
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO stacks (stack_id, name, current_version, created_at) VALUES (?, ?, NULL, ?)")
            .bind(&stack.stack_id)
            .bind(&stack.name)
            .bind(stack.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::StackExists(stack_id.to_string())
                } else {
                    StoreError::Database(e)
                }
            })?;

        Ok(stack)
    }

    async fn get_stack(&self, stack_id: &str) -> Result<Option<Stack>, StoreError> {
        let row = sqlx::query_as::<_, StackRow>(
            "SELECT stack_id, name, current_version, created_at FROM stacks WHERE stack_id = ?",
        )
        .bind(stack_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Stack::from))
    }

    async fn list_stacks(&self) -> Result<Vec<Stack>, StoreError> {
        let rows = sqlx::query_as::<_, StackRow>(
            "SELECT stack_id, name, current_version, created_at FROM stacks ORDER BY stack_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Stack::from).collect())
    }

    async fn set_current_version(
        &self,
        stack_id: &str,
        version: Option<&str>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE stacks SET current_version = ? WHERE stack_id = ?")
            .bind(version)
            .bind(stack_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::StackNotFound(stack_id.to_string()));
        }
        Ok(())
    }

    async fn insert_version(&self, version: &StackVersion) -> Result<(), StoreError> {
        if self.get_stack(&version.stack_id).await?.is_none() {
            return Err(StoreError::StackNotFound(version.stack_id.clone()));
        }

        sqlx::query(
            r#"
            INSERT INTO stack_versions
                (stack_id, version, parent_version, body, hash, created_by, comment, created_at, seq)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?,
                (SELECT COALESCE(MAX(seq), 0) + 1 FROM stack_versions WHERE stack_id = ?))
            "#,
        )
        .bind(&version.stack_id)
        .bind(&version.version)
        .bind(&version.parent_version)
        .bind(&version.body)
        .bind(&version.hash)
        .bind(&version.created_by)
        .bind(&version.comment)
        .bind(version.created_at)
        .bind(&version.stack_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::VersionExists {
                    stack_id: version.stack_id.clone(),
                    version: version.version.clone(),
                }
            } else {
                StoreError::Database(e)
            }
        })?;

        Ok(())
    }

    async fn get_version(
        &self,
        stack_id: &str,
        version: &str,
    ) -> Result<Option<StackVersion>, StoreError> {
        let sql =
            format!("SELECT {VERSION_COLUMNS} FROM stack_versions WHERE stack_id = ? AND version = ?");
        let row = sqlx::query_as::<_, VersionRow>(&sql)
            .bind(stack_id)
            .bind(version)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(StackVersion::from))
    }

    async fn latest_version(&self, stack_id: &str) -> Result<Option<StackVersion>, StoreError> {
        Ok(self.list_versions(stack_id, 1).await?.into_iter().next())
    }

    async fn list_versions(
        &self,
        stack_id: &str,
        limit: usize,
    ) -> Result<Vec<StackVersion>, StoreError> {
        let sql = format!(
            "SELECT {VERSION_COLUMNS} FROM stack_versions WHERE stack_id = ? ORDER BY seq DESC LIMIT ?"
        );
        let rows = sqlx::query_as::<_, VersionRow>(&sql)
            .bind(stack_id)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(StackVersion::from).collect())
    }
}
