//! davgate Error Types

use thiserror::Error;

/// Result type alias for davgate operations
pub type Result<T> = std::result::Result<T, Error>;

/// davgate error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to render configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    // Credential store load errors
    #[error("Credential file {path} is unreadable: {source}")]
    SourceUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Credential file {path} is {size} bytes, limit is {limit} bytes")]
    SourceTooLarge { path: String, size: u64, limit: u64 },

    #[error("Invalid credential record at line {line}: expected 2 fields separated by ':', found {fields} in \"{content}\"")]
    MalformedRecord {
        line: usize,
        content: String,
        fields: usize,
    },

    #[error("Invalid credential file: identity {identity} at line {line} was already defined")]
    DuplicateIdentity { line: usize, identity: String },

    // Credential record edits
    #[error("Invalid credential record for \"{identity}\": {reason}")]
    InvalidRecord { identity: String, reason: String },

    // Hashing errors
    #[error("Hash error: {0}")]
    Hash(String),

    // Per-request access errors
    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Forbidden")]
    Forbidden,

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),
}

impl Error {
    /// Check if this error came from loading the credential store.
    /// These abort startup; the server never runs with a store it could not load.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Error::SourceUnreadable { .. }
                | Error::SourceTooLarge { .. }
                | Error::MalformedRecord { .. }
                | Error::DuplicateIdentity { .. }
        )
    }

    /// Check if this error denies a single request
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Error::Unauthenticated | Error::Forbidden)
    }
}
