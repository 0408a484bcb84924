// ABOUTME: Runtime error types with SNAFU pattern.
// ABOUTME: Unifies detection and connection errors for programmatic handling.

use snafu::Snafu;

use super::detection::DetectionError;
use super::traits::RuntimeInfoError;

/// Failure to reach a container runtime.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RuntimeError {
    #[snafu(display("runtime detection failed: {source}"))]
    Detection { source: DetectionError },

    #[snafu(display("runtime connection failed: {source}"))]
    Connection { source: RuntimeInfoError },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// No socket found while auto-detecting.
    NoRuntimeFound,
    /// The configured socket path does not exist.
    SocketMissing,
    /// The socket exists but the runtime did not answer.
    ConnectionFailed,
    RuntimeOperation,
}

impl RuntimeError {
    pub fn kind(&self) -> RuntimeErrorKind {
        match self {
            RuntimeError::Detection { source } => match source {
                DetectionError::NoRuntimeFound => RuntimeErrorKind::NoRuntimeFound,
                DetectionError::SocketMissing { .. } => RuntimeErrorKind::SocketMissing,
            },
            RuntimeError::Connection { source } => match source {
                RuntimeInfoError::ConnectionFailed(_) => RuntimeErrorKind::ConnectionFailed,
                RuntimeInfoError::Runtime(_) => RuntimeErrorKind::RuntimeOperation,
            },
        }
    }
}

impl From<DetectionError> for RuntimeError {
    fn from(source: DetectionError) -> Self {
        RuntimeError::Detection { source }
    }
}

impl From<RuntimeInfoError> for RuntimeError {
    fn from(source: RuntimeInfoError) -> Self {
        RuntimeError::Connection { source }
    }
}
