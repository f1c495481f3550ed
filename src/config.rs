//! Factory configuration.
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FactoryConfig {
    /// Namespace the builtin document is referenced under.
    pub builtin_namespace: String,
    /// Timeout for fetching a referenced document over HTTP.
    pub fetch_timeout_secs: u64,
    /// Maximum nesting of URL references within one build.
    pub max_reference_depth: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            builtin_namespace: "builtin".to_string(),
            fetch_timeout_secs: 30,
            max_reference_depth: 16,
        }
    }
}

impl FactoryConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        crate::path_de::from_str_with_path(&source)
            .map_err(|error| ConfigError::Parse { path: path.to_path_buf(), reason: error.to_string() })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
