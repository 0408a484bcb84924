// ABOUTME: Container runtime access for Docker and Podman.
// ABOUTME: Capability traits, local detection and the bollard-backed implementation.

mod bollard;
mod detection;
mod error;
#[cfg(test)]
pub(crate) mod fake;
pub mod traits;
mod types;

pub use self::bollard::BollardRuntime;
pub use detection::{DetectionError, detect_runtime};
pub use error::{RuntimeError, RuntimeErrorKind};
pub use traits::*;
pub use types::{RuntimeConfig, RuntimeInfo as DetectedRuntime, RuntimeType};

/// Detect the local runtime, connect to it and confirm it answers.
pub async fn connect(config: &RuntimeConfig) -> Result<BollardRuntime, RuntimeError> {
    let detected = detect_runtime(config)?;
    let runtime = BollardRuntime::connect(&detected)?;
    runtime.ping().await?;
    Ok(runtime)
}
