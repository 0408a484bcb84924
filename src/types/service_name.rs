// ABOUTME: Validated names for services and stacks.
// ABOUTME: Both become parts of runtime object names, so they share one character set.

use super::network_alias::{NetworkAlias, is_name_char};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("{kind} name cannot be empty")]
    Empty { kind: &'static str },

    #[error("{kind} name exceeds maximum length of 63 characters")]
    TooLong { kind: &'static str },

    #[error("{kind} name must start with a letter or digit")]
    BadStart { kind: &'static str },

    #[error("invalid character in {kind} name: '{ch}'")]
    InvalidChar { kind: &'static str, ch: char },
}

fn validate(kind: &'static str, value: &str) -> Result<(), NameError> {
    let first = value.chars().next().ok_or(NameError::Empty { kind })?;
    if value.len() > 63 {
        return Err(NameError::TooLong { kind });
    }
    if !first.is_ascii_alphanumeric() {
        return Err(NameError::BadStart { kind });
    }
    match value.chars().find(|c| !is_name_char(*c)) {
        Some(ch) => Err(NameError::InvalidChar { kind, ch }),
        None => Ok(()),
    }
}

macro_rules! validated_name {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: &str) -> Result<Self, NameError> {
                validate($kind, value)?;
                Ok(Self(value.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = NameError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::new(&raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

validated_name!(
    /// Name of a service inside a stack; also its hostname and network alias.
    ServiceName,
    "service"
);

validated_name!(
    /// Identifier of a stack.
    StackId,
    "stack"
);

impl ServiceName {
    /// Service names use the alias character set.
    pub fn as_alias(&self) -> NetworkAlias {
        NetworkAlias::from_validated(self.0.clone())
    }
}
