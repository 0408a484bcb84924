// ABOUTME: Validated domain types and runtime identifiers.
// ABOUTME: Names, image references and phantom-typed container/network IDs.

mod id;
mod image_ref;
mod network_alias;
mod service_name;

pub use id::{ContainerId, NetworkId};
pub use image_ref::{ImageRef, ParseImageRefError};
pub use network_alias::{NetworkAlias, NetworkAliasError};
pub use service_name::{NameError, ServiceName, StackId};
