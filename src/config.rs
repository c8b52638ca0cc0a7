//! davgate Configuration
//!
//! Every setting has a built-in default, so the server runs without a
//! configuration file. The defaults match existing Radicale deployments.

use axum::http::Method;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::auth::MAX_PATH_SEGMENTS;
use crate::credentials::MAX_CREDENTIAL_FILE_SIZE;

/// Main davgate configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DavGateConfig {
    /// HTTP listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Served directory tree
    #[serde(default)]
    pub storage: StorageConfig,

    /// Credential file
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Access rules
    #[serde(default)]
    pub access: AccessConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Realm sent in the `WWW-Authenticate` challenge
    #[serde(default = "default_realm")]
    pub realm: String,
}

/// Served directory tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory; each identity owns `<root>/<identity>`
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

/// Credential file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Path to the `identity:hash` file
    #[serde(default = "default_credentials_path")]
    pub path: PathBuf,

    /// Refuse credential files larger than this many bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

/// Access rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Maximum `/`-separated parts in a request path (root included)
    #[serde(default = "default_max_path_segments")]
    pub max_path_segments: usize,

    /// Methods the file engine does not implement; answered with 501
    #[serde(default = "default_unimplemented_methods")]
    pub unimplemented_methods: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:4000".to_string()
}

fn default_realm() -> String {
    "CalDavServer - Password Required".to_string()
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("/var/lib/radicale/collections/collection-root")
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("/etc/radicale/users")
}

fn default_max_file_size() -> u64 {
    MAX_CREDENTIAL_FILE_SIZE
}

fn default_max_path_segments() -> usize {
    MAX_PATH_SEGMENTS
}

fn default_unimplemented_methods() -> Vec<String> {
    ["PROPFIND", "PROPPATCH", "MKCALENDAR", "MKCOL", "REPORT"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            realm: default_realm(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            path: default_credentials_path(),
            max_file_size: default_max_file_size(),
        }
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            max_path_segments: default_max_path_segments(),
            unimplemented_methods: default_unimplemented_methods(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl DavGateConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: DavGateConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.bind_address.is_empty() {
            return Err(crate::Error::Config("server.bind_address cannot be empty".into()));
        }

        if self.server.realm.contains('"') || self.server.realm.chars().any(char::is_control) {
            return Err(crate::Error::Config(
                "server.realm cannot contain quotes or control characters".into(),
            ));
        }

        if self.credentials.max_file_size == 0 {
            return Err(crate::Error::Config("credentials.max_file_size must be positive".into()));
        }

        // Root part plus the identity's own segment
        if self.access.max_path_segments < 2 {
            return Err(crate::Error::Config(
                "access.max_path_segments must be at least 2".into(),
            ));
        }

        self.unimplemented_methods()?;

        Ok(())
    }

    /// Parse the configured unimplemented methods
    pub fn unimplemented_methods(&self) -> crate::Result<Vec<Method>> {
        self.access
            .unimplemented_methods
            .iter()
            .map(|name| {
                Method::from_bytes(name.trim().to_ascii_uppercase().as_bytes()).map_err(|_| {
                    crate::Error::Config(format!("invalid HTTP method in access.unimplemented_methods: {}", name))
                })
            })
            .collect()
    }
}
