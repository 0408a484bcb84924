// ABOUTME: Container image reference parsing and normalization.
// ABOUTME: Accepts nginx, nginx:tag, registry:port/org/image:tag and @digest forms.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0:?}")]
    InvalidChar(char),

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),
}

/// A parsed image reference.
///
/// References without a tag or digest are normalized to `:latest`, so the
/// `Display` form is what the runtime records as the container's image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    registry: Option<String>,
    repository: String,
    tag: Option<String>,
    digest: Option<String>,
}

fn is_reference_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '-' | '_' | '@')
}

impl ImageRef {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }
        if let Some(bad) = input.chars().find(|c| !is_reference_char(*c)) {
            return Err(ParseImageRefError::InvalidChar(bad));
        }

        let (rest, digest) = match input.split_once('@') {
            Some((_, "")) => return Err(ParseImageRefError::InvalidFormat(input.to_string())),
            Some((rest, digest)) => (rest, Some(digest.to_string())),
            None => (input, None),
        };

        // A colon after the last slash separates the tag; earlier colons belong
        // to a registry port.
        let last_slash = rest.rfind('/').map_or(0, |i| i + 1);
        let (path, tag) = match rest[last_slash..].split_once(':') {
            Some((_, "")) => return Err(ParseImageRefError::InvalidFormat(input.to_string())),
            Some((_, tag)) => (&rest[..rest.len() - tag.len() - 1], Some(tag.to_string())),
            None => (rest, None),
        };

        let (registry, repository) = match path.split_once('/') {
            Some((first, remainder))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (Some(first.to_string()), remainder.to_string())
            }
            _ => (None, path.to_string()),
        };

        if repository.is_empty()
            || repository.starts_with('/')
            || repository.ends_with('/')
            || repository.contains("//")
        {
            return Err(ParseImageRefError::InvalidFormat(input.to_string()));
        }

        let tag = match (tag, &digest) {
            (None, None) => Some("latest".to_string()),
            (tag, _) => tag,
        };

        Ok(Self {
            registry,
            repository,
            tag,
            digest,
        })
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    /// Repository path without registry, tag or digest (e.g. `library/nginx`).
    pub fn name(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }
}

impl FromStr for ImageRef {
    type Err = ParseImageRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(registry) = &self.registry {
            write!(f, "{registry}/")?;
        }
        f.write_str(&self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

impl Serialize for ImageRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
