//! Adapter configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which kind of transport backs the adapter.
///
/// Replaces runtime type inspection of the connection: the integration that
/// constructs the adapter states what it wired in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Real HTTP client exchanging requests over the network
    #[default]
    Http,
    /// In-process functional client, no network involved
    Functional,
}

/// Adapter configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// OpenAPI/Swagger document path (empty: load explicitly later)
    #[serde(default)]
    pub schema: PathBuf,

    /// Transport capability flag
    #[serde(default)]
    pub transport: TransportKind,
}

impl Config {
    /// Whether a schema path was configured for implicit load.
    #[must_use]
    pub fn has_schema(&self) -> bool {
        !self.schema.as_os_str().is_empty()
    }

    /// Load config from file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Load from default location (.apiconform.toml)
    pub fn load_default() -> Result<Self, ConfigError> {
        let candidates = [".apiconform.toml", ".apiconform.json", "apiconform.toml"];

        for name in candidates {
            let path = Path::new(name);
            if path.exists() {
                return Self::load(path);
            }
        }

        // No config file, return default
        Ok(Self::default())
    }

    /// Create example config file
    pub fn example() -> &'static str {
        r#"# apiconform configuration

# OpenAPI/Swagger document validated against (local file path)
schema = "openapi.yaml"

# Transport backing the adapter: "http" (real client) or "functional"
# (in-process client)
transport = "http"
"#
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
}
