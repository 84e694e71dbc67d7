//! Build metadata.
//!
//! Version information is fixed at compile time and handed to whatever needs
//! it (the CLI `--version` output, the HTTP `User-Agent`), rather than read
//! from mutable package-level state.

use std::fmt;

/// Immutable name and version of this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
}

impl BuildInfo {
    /// Metadata for the current crate, taken from Cargo at compile time.
    pub const CURRENT: BuildInfo = BuildInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    };

    /// Value sent as the `User-Agent` header on outbound requests.
    pub fn user_agent(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}
