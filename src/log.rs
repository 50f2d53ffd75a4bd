//! Feature-gated diagnostics.
//!
//! Layout emits the occasional `debug!`/`warn!` for skipped or
//! degenerate connectors. With the `tracing` feature these go through
//! `tracing`; without it the macros compile away and the layout core
//! stays dependency-free at runtime.

#[cfg(feature = "tracing")]
pub use tracing::{debug, warn};

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub use crate::{debug, warn};
