// ABOUTME: Duration settings for runtime calls and the command worker loop.
// ABOUTME: Parsed with humantime, e.g. "180s", "250ms", "2m".

use crate::error::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Timeouts {
    /// Upper bound on a blocking image pull.
    #[serde(default = "default_pull", with = "humantime_serde")]
    pub pull: Duration,

    /// Upper bound on a command run inside a container.
    #[serde(default = "default_exec", with = "humantime_serde")]
    pub exec: Duration,

    /// Grace period before a stopping container is killed.
    #[serde(default = "default_stop", with = "humantime_serde")]
    pub stop: Duration,
}

fn default_pull() -> Duration {
    Duration::from_secs(180)
}

fn default_exec() -> Duration {
    Duration::from_secs(60)
}

fn default_stop() -> Duration {
    Duration::from_secs(5)
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            pull: default_pull(),
            exec: default_exec(),
            stop: default_stop(),
        }
    }
}

impl Timeouts {
    pub(super) fn validate(&self) -> Result<()> {
        if self.pull.is_zero() || self.exec.is_zero() {
            return Err(Error::InvalidConfig(
                "timeouts.pull and timeouts.exec must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Sleep between claim attempts when the queue is idle.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Sleep after a storage error outside command execution.
    #[serde(default = "default_error_backoff", with = "humantime_serde")]
    pub error_backoff: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_error_backoff() -> Duration {
    Duration::from_millis(500)
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            error_backoff: default_error_backoff(),
        }
    }
}

impl WorkerConfig {
    pub(super) fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "worker.poll_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
