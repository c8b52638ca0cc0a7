//! Credential storage
//!
//! Loads the `identity:hash` credential file and verifies presented secrets
//! against the stored hashes.

pub mod hash;
pub mod store;

pub use hash::{
    HashScheme, decoy_hash, hash_argon2, hash_bcrypt, is_well_formed, verify_secret,
    work_factor,
};
pub use store::{CredentialStore, FIELD_SEPARATOR, LINE_SEPARATOR, MAX_CREDENTIAL_FILE_SIZE};
