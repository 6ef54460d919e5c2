//! Generic async file-based config source.
//!
//! [`FileSource`] reads a file of any supported format through a
//! deserialization function chosen at construction time, and stamps the
//! result with the SHA-256 of the raw content so the health endpoint can
//! report which revision is running.

use std::path::{Path, PathBuf};

use super::sha256_hex;
use crate::config::model::Config;
use crate::config::ConfigVersion;
use crate::error::ForwarderError;

type Deserialize = fn(&str) -> Result<Config, Box<dyn std::error::Error + Send + Sync>>;

pub struct FileSource {
    path: PathBuf,
    name: &'static str,
    deserialize: Deserialize,
}

impl FileSource {
    #[must_use]
    pub fn new(path: PathBuf, name: &'static str, deserialize: Deserialize) -> Self {
        Self {
            path,
            name,
            deserialize,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<(Config, ConfigVersion), ForwarderError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ForwarderError::ConfigFileNotFound {
                    path: self.path.clone(),
                }
            } else {
                ForwarderError::Io(e)
            }
        })?;

        let config = (self.deserialize)(&content).map_err(|e| ForwarderError::ConfigParse {
            path: self.path.display().to_string(),
            source: e,
        })?;

        let hash = sha256_hex(content.as_bytes());
        Ok((config, ConfigVersion::Hash(hash)))
    }
}
