//! Configuration loading and validation.
//!
//! Configuration is read exactly once at startup: an optional file source
//! ([`sources`]) is parsed into the serde [`model`], CLI and environment
//! overrides are layered on top, [`validation`] checks the result, and
//! [`settings::Settings`] freezes it into the immutable form every request
//! borrows.

pub mod model;
pub mod settings;
pub mod sources;
pub mod validation;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigVersion {
    Hash(String),
    /// No file was read; everything came from flags and defaults.
    Inline,
}

impl ConfigVersion {
    /// Short form for logs and the health payload.
    #[must_use]
    pub fn short(&self) -> &str {
        match self {
            Self::Hash(h) => h.get(..8).unwrap_or(h),
            Self::Inline => "inline",
        }
    }
}
