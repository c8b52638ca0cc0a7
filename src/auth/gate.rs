//! Per-request access decision
//!
//! A request is allowed when the presented secret verifies against the
//! identity's stored hash AND the request path lies inside that identity's
//! own subtree. Both checks run in that order; callers see one outcome for
//! every failure.

use std::sync::Arc;

use crate::credentials::{
    decoy_hash, is_well_formed, verify_secret, work_factor, CredentialStore, HashScheme,
};
use crate::error::{Error, Result};

/// Separates path segments
pub const PATH_SEPARATOR: char = '/';

/// Maximum number of `/`-separated parts in a request path, counting the
/// empty part before the leading separator. `/alice/a/b` is the deepest
/// path allowed by default.
pub const MAX_PATH_SEGMENTS: usize = 4;

/// Authenticates and authorizes requests against an immutable store
#[derive(Debug)]
pub struct AccessGate {
    store: Arc<CredentialStore>,
    decoy: String,
    max_path_segments: usize,
}

impl AccessGate {
    /// Create a gate over a loaded store.
    ///
    /// Builds the decoy hash that unknown identities are verified against,
    /// using the scheme and cost of the most expensive well-formed hash in
    /// the store.
    pub fn new(store: Arc<CredentialStore>, max_path_segments: usize) -> Result<Self> {
        let costed: Vec<(&str, u64)> = store
            .identities()
            .filter_map(|identity| store.lookup(identity))
            .filter_map(|hash| work_factor(hash).map(|cost| (hash, cost)))
            .collect();
        let reference = costed.iter().max_by_key(|(_, cost)| *cost).copied();
        let decoy = decoy_hash(reference.map(|(hash, _)| hash))?;

        if let Some((reference, highest)) = reference {
            let scheme = HashScheme::detect(reference);
            let mixed = costed
                .iter()
                .any(|(hash, cost)| *cost != highest || HashScheme::detect(hash) != scheme);
            if mixed {
                tracing::warn!(
                    "Credential hashes use mixed schemes or costs; rehash them at one cost \
                     so every identity takes as long to verify as an unknown one"
                );
            }
        }

        let malformed = store.len() - costed.len();
        if malformed > 0 {
            tracing::warn!(
                "{} credential record(s) have an unsupported hash and can never authenticate",
                malformed
            );
        }

        Ok(Self {
            store,
            decoy,
            max_path_segments,
        })
    }

    /// The store this gate reads from
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Verify a presented secret for an identity.
    ///
    /// Unknown identities and unusable stored hashes are verified against the
    /// decoy so every failure costs one full hash verification.
    pub fn authenticate(&self, identity: &str, secret: &str) -> Result<()> {
        let (hash, known) = match self.store.lookup(identity) {
            Some(hash) if is_well_formed(hash) => (hash, true),
            _ => (self.decoy.as_str(), false),
        };

        let verified = verify_secret(secret, hash);
        if verified && known {
            Ok(())
        } else {
            Err(Error::Unauthenticated)
        }
    }

    /// Check that `request_path` lies inside `identity`'s subtree
    pub fn authorize(&self, identity: &str, request_path: &str) -> Result<()> {
        if identity.is_empty() {
            return Err(Error::Forbidden);
        }

        let path = urlencoding::decode(request_path).map_err(|_| Error::Forbidden)?;
        let segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();

        // segments[0] is the empty root before the leading separator
        let rooted = segments.first() == Some(&"");
        let owned = segments.get(1) == Some(&identity);
        let shallow = segments.len() <= self.max_path_segments;
        let normalized = !segments.iter().any(|s| *s == "." || *s == "..");

        if rooted && owned && shallow && normalized {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }

    /// Authenticate, then authorize. Authorization is skipped when
    /// authentication fails.
    pub fn check(&self, identity: &str, secret: &str, request_path: &str) -> Result<()> {
        self.authenticate(identity, secret)?;
        self.authorize(identity, request_path)
    }
}
