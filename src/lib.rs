//! davgate - Credential-Gated WebDAV File Server
//!
//! Serves a directory tree over WebDAV/CalDAV and confines every user to
//! their own subtree.
//!
//! # Architecture
//!
//! Credentials live in a flat `identity:hash` file that is loaded once at
//! startup and never changes while serving. Each request passes through:
//!
//! 1. HTTP Basic credential extraction (missing -> challenge)
//! 2. Secret verification against the stored bcrypt or Argon2 hash
//! 3. Path ownership: the first path segment must be the identity
//! 4. Forwarding, unmodified, to the WebDAV engine
//!
//! Every rejection looks the same to the client, whether the identity is
//! unknown, the secret is wrong, or the path belongs to someone else.

pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod server;

pub use config::DavGateConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::auth::{AccessGate, BasicCredentials};
    pub use crate::config::DavGateConfig;
    pub use crate::credentials::{CredentialStore, HashScheme};
    pub use crate::error::{Error, Result};
    pub use crate::server::{DavEngine, Dispatcher, FileEngine, HttpServer, Verdict};
}
