//! File-based config sources.
//!
//! Provides [`file_source::FileSource`], [`for_path`] which picks the
//! deserializer for a file by extension (YAML, JSON, TOML, each gated by a
//! feature flag), and the [`parse_config_str`] helper used by `validate`.

pub mod file_source;

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::config::model::Config;
use crate::error::ForwarderError;
use file_source::FileSource;

/// File names probed, in order, when no `--config` is given.
pub const AUTO_DETECT_CANDIDATES: &[&str] = &[
    "edge-forwarder.yaml",
    "edge-forwarder.yml",
    "edge-forwarder.json",
    "edge-forwarder.toml",
];

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<Config, ForwarderError> {
    #[allow(unused_variables)]
    let wrap = |source: BoxError| ForwarderError::ConfigParse {
        path: path_display.to_string(),
        source,
    };

    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| wrap(Box::new(e))),

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(|e| wrap(Box::new(e))),

        #[cfg(feature = "toml")]
        "toml" => toml::from_str(content).map_err(|e| wrap(Box::new(e))),

        other => Err(ForwarderError::UnsupportedFormat(other.to_string())),
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Pick the [`FileSource`] matching a path's extension.
pub fn for_path(path: &Path) -> Result<FileSource, ForwarderError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let path = path.to_path_buf();

    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => Ok(FileSource::new(path, "yaml", |content| {
            serde_yml::from_str::<Config>(content).map_err(|e| Box::new(e) as BoxError)
        })),

        #[cfg(feature = "json")]
        "json" => Ok(FileSource::new(path, "json", |content| {
            serde_json::from_str::<Config>(content).map_err(|e| Box::new(e) as BoxError)
        })),

        #[cfg(feature = "toml")]
        "toml" => Ok(FileSource::new(path, "toml", |content| {
            toml::from_str::<Config>(content).map_err(|e| Box::new(e) as BoxError)
        })),

        other => Err(ForwarderError::UnsupportedFormat(other.to_string())),
    }
}

/// Compute a lowercase hex-encoded SHA-256 digest.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}
