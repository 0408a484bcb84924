// ABOUTME: Sealed marker for runtime capability traits.
// ABOUTME: Only runtimes defined in this crate may implement them.

/// Implemented by the bollard runtime and the in-crate test runtime.
pub trait Sealed {}
