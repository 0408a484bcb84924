// ABOUTME: Composable capability traits for container runtimes.
// ABOUTME: ImageOps, ContainerOps, NetworkOps, VolumeOps, ExecOps, LogOps and RuntimeInfo.

mod container;
mod exec;
mod image;
mod logs;
mod network;
mod runtime_info;
pub(crate) mod sealed;
mod shared_types;
mod volume;

pub use container::{ContainerError, ContainerFilters, ContainerOps, ContainerSummary};
pub use exec::{ExecError, ExecOps};
pub use image::{ImageError, ImageOps};
pub use logs::{LogError, LogLine, LogLineStream, LogOps, LogOptions, LogStream};
pub use network::{NetworkError, NetworkOps};
pub use runtime_info::{RuntimeInfo, RuntimeInfoError};
pub use shared_types::*;
pub use volume::{VolumeError, VolumeOps};

/// Everything the convergence engine needs from a runtime.
pub trait FullRuntime:
    ImageOps + ContainerOps + NetworkOps + VolumeOps + ExecOps + LogOps + RuntimeInfo
{
}

impl<T> FullRuntime for T where
    T: ImageOps + ContainerOps + NetworkOps + VolumeOps + ExecOps + LogOps + RuntimeInfo
{
}
