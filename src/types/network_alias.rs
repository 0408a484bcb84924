// ABOUTME: Validated DNS alias a container answers to on its stack network.
// ABOUTME: Aliases are non-empty and limited to alphanumerics, hyphen, underscore and dot.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NetworkAliasError {
    #[error("network alias cannot be empty")]
    Empty,

    #[error("invalid character in network alias: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetworkAlias(String);

impl NetworkAlias {
    pub fn new(value: &str) -> Result<Self, NetworkAliasError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(NetworkAliasError::Empty);
        }
        match trimmed.chars().find(|c| !is_name_char(*c)) {
            Some(c) => Err(NetworkAliasError::InvalidChar(c)),
            None => Ok(Self(trimmed.to_string())),
        }
    }

    /// Wraps a name already checked against `is_name_char`.
    pub(super) fn from_validated(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub(super) fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

impl fmt::Display for NetworkAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
