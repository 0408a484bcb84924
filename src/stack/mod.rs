// ABOUTME: Stack model: spec parsing, dependency order, naming and drift detection.
// ABOUTME: Pure code with no runtime or storage access.

pub mod desired;
pub mod diff;
pub mod graph;
pub mod labels;
pub mod spec;

pub use desired::container_config;
pub use diff::{Drift, diff, is_same};
pub use graph::{CycleError, ServiceGraph};
pub use labels::{MANAGED_BY, NETWORK_ROLE, Naming, VOLUME_ROLE};
pub use spec::{MountSpec, ServiceSpec, SpecError, StackSpec, split_command};
