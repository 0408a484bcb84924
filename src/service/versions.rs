// ABOUTME: Stack creation and content-addressed version creation.
// ABOUTME: A body identical to the latest version's returns that version instead of a new one.

use super::ServiceError;
use crate::stack::StackSpec;
use crate::store::{Stack, StackStore, StackVersion};
use crate::types::StackId;
use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Input for [`VersionService::create_version`].
#[derive(Debug, Clone, Default)]
pub struct NewVersion {
    pub body: Option<Value>,
    /// Label to use; `v<epoch-millis>` when absent.
    pub version: Option<String>,
    pub created_by: Option<String>,
    pub comment: Option<String>,
}

/// Serialize `value` with every object's keys in sorted order.
pub fn canonical_json(value: &Value) -> String {
    fn sorted(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                Value::Object(
                    entries
                        .into_iter()
                        .map(|(k, v)| (k.clone(), sorted(v)))
                        .collect(),
                )
            }
            Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }
    sorted(value).to_string()
}

/// Lowercase hex SHA-256 of `text`.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub struct VersionService {
    stacks: Arc<dyn StackStore>,
}

impl VersionService {
    pub fn new(stacks: Arc<dyn StackStore>) -> Self {
        Self { stacks }
    }

    pub async fn create_stack(
        &self,
        stack_id: &str,
        name: Option<&str>,
    ) -> Result<Stack, ServiceError> {
        let id = StackId::new(stack_id)?;
        let stack = self
            .stacks
            .create_stack(id.as_str(), name.unwrap_or(id.as_str()))
            .await?;
        tracing::info!(stack = stack_id, "Stack created");
        Ok(stack)
    }

    pub async fn get_stack(&self, stack_id: &str) -> Result<Stack, ServiceError> {
        self.stacks
            .get_stack(stack_id)
            .await?
            .ok_or_else(|| ServiceError::StackNotFound(stack_id.to_string()))
    }

    pub async fn list_stacks(&self) -> Result<Vec<Stack>, ServiceError> {
        Ok(self.stacks.list_stacks().await?)
    }

    /// Store a new version unless the body hashes the same as the latest one.
    ///
    /// Returns the version and whether it was newly created.
    pub async fn create_version(
        &self,
        stack_id: &str,
        new: NewVersion,
    ) -> Result<(StackVersion, bool), ServiceError> {
        self.get_stack(stack_id).await?;
        let body = match new.body {
            None | Some(Value::Null) => return Err(ServiceError::MissingBody),
            Some(body) => body,
        };
        StackSpec::parse(&body)?;

        let canonical = canonical_json(&body);
        let hash = content_hash(&canonical);
        let latest = self.stacks.latest_version(stack_id).await?;
        if let Some(latest) = latest.as_ref().filter(|v| v.hash == hash) {
            tracing::info!(stack = stack_id, version = %latest.version, "Body unchanged; reusing latest version");
            return Ok((latest.clone(), false));
        }

        let label = match non_blank(new.version) {
            Some(label) => label,
            None => self.generated_label(stack_id).await?,
        };
        let record = StackVersion {
            stack_id: stack_id.to_string(),
            version: label,
            parent_version: latest.map(|v| v.version),
            body: canonical,
            hash,
            created_by: non_blank(new.created_by).unwrap_or_else(|| "system".to_string()),
            comment: non_blank(new.comment),
            created_at: Utc::now(),
        };
        self.stacks.insert_version(&record).await?;
        tracing::info!(stack = stack_id, version = %record.version, "Version created");
        Ok((record, true))
    }

    /// `v<epoch-millis>`, bumped past any label already taken.
    async fn generated_label(&self, stack_id: &str) -> Result<String, ServiceError> {
        let mut millis = Utc::now().timestamp_millis();
        loop {
            let label = format!("v{millis}");
            if self.stacks.get_version(stack_id, &label).await?.is_none() {
                return Ok(label);
            }
            millis += 1;
        }
    }

    pub async fn get_version(
        &self,
        stack_id: &str,
        version: &str,
    ) -> Result<StackVersion, ServiceError> {
        self.stacks
            .get_version(stack_id, version)
            .await?
            .ok_or_else(|| ServiceError::VersionNotFound {
                stack_id: stack_id.to_string(),
                version: version.to_string(),
            })
    }

    pub async fn latest_version(&self, stack_id: &str) -> Result<Option<StackVersion>, ServiceError> {
        Ok(self.stacks.latest_version(stack_id).await?)
    }

    /// Most recent first.
    pub async fn list_versions(
        &self,
        stack_id: &str,
        limit: usize,
    ) -> Result<Vec<StackVersion>, ServiceError> {
        self.get_stack(stack_id).await?;
        Ok(self.stacks.list_versions(stack_id, limit).await?)
    }
}
