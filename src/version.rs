//! Version of the software, taken from the crate manifest at build time.

/// The fgvar version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
