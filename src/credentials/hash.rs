//! Secret hashing and verification
//!
//! Stored hashes are either bcrypt (`$2a$`, `$2b$`, `$2x$`, `$2y$`), which is
//! what Radicale-era htpasswd files contain, or Argon2 PHC strings
//! (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`).
//!
//! Verification never reports *why* it failed. Callers that need the cost of
//! a failed lookup to match a real verification use [`decoy_hash`].

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

use crate::error::{Error, Result};

/// bcrypt cost used when nothing better is known
pub const DEFAULT_BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

/// Length of a complete bcrypt hash string
const BCRYPT_HASH_LEN: usize = 60;

/// Cost range accepted by bcrypt
const BCRYPT_COSTS: std::ops::RangeInclusive<u32> = 4..=31;

/// Supported hash schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashScheme {
    Bcrypt,
    Argon2,
}

impl HashScheme {
    /// Detect the scheme from a stored hash prefix
    pub fn detect(hash: &str) -> Option<Self> {
        if ["$2a$", "$2b$", "$2x$", "$2y$"]
            .iter()
            .any(|prefix| hash.starts_with(prefix))
        {
            Some(HashScheme::Bcrypt)
        } else if hash.starts_with("$argon2") {
            Some(HashScheme::Argon2)
        } else {
            None
        }
    }

    /// Hash a secret with this scheme's default parameters
    pub fn hash(self, secret: &str) -> Result<String> {
        match self {
            HashScheme::Bcrypt => hash_bcrypt(secret, DEFAULT_BCRYPT_COST),
            HashScheme::Argon2 => hash_argon2(secret),
        }
    }
}

impl std::str::FromStr for HashScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bcrypt" => Ok(HashScheme::Bcrypt),
            "argon2" | "argon2id" => Ok(HashScheme::Argon2),
            other => Err(Error::Hash(format!("unknown hash scheme: {}", other))),
        }
    }
}

/// Hash a secret with bcrypt at the given cost
pub fn hash_bcrypt(secret: &str, cost: u32) -> Result<String> {
    bcrypt::hash(secret, cost).map_err(|e| Error::Hash(format!("bcrypt hash failed: {}", e)))
}

/// Hash a secret with Argon2id and a fresh random salt
pub fn hash_argon2(secret: &str) -> Result<String> {
    hash_argon2_with(&Argon2::default(), secret)
}

fn hash_argon2_with(argon2: &Argon2<'_>, secret: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| Error::Hash(format!("salt generation failed: {}", e)))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| Error::Hash(format!("salt encoding failed: {}", e)))?;

    let phc = argon2
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| Error::Hash(format!("argon2 hash failed: {}", e)))?;

    Ok(phc.to_string())
}

/// Check that a stored hash can be verified without bailing out early.
///
/// bcrypt and Argon2 verifiers both reject malformed input before doing any
/// work, so malformed hashes must be caught here and routed to a decoy.
pub fn is_well_formed(hash: &str) -> bool {
    match HashScheme::detect(hash) {
        Some(HashScheme::Bcrypt) => bcrypt_cost(hash).is_some(),
        Some(HashScheme::Argon2) => argon2_matching(hash).is_ok(),
        None => false,
    }
}

/// Relative cost of verifying against a well-formed hash.
///
/// bcrypt is `2^cost`; Argon2 is `m_cost * t_cost`. Only meaningful when
/// comparing hashes of the same scheme.
pub fn work_factor(hash: &str) -> Option<u64> {
    match HashScheme::detect(hash)? {
        HashScheme::Bcrypt => bcrypt_cost(hash).map(|cost| 1u64 << cost),
        HashScheme::Argon2 => {
            let argon2 = argon2_matching(hash).ok()?;
            let params = argon2.params();
            Some(u64::from(params.m_cost()) * u64::from(params.t_cost()))
        }
    }
}

/// Verify a secret against a stored hash. Any failure is `false`.
pub fn verify_secret(secret: &str, hash: &str) -> bool {
    match HashScheme::detect(hash) {
        Some(HashScheme::Bcrypt) => bcrypt::verify(secret, hash).unwrap_or(false),
        Some(HashScheme::Argon2) => match PasswordHash::new(hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(secret.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        },
        None => false,
    }
}

/// Build a throwaway hash with the same scheme and cost as `reference`.
///
/// Verifying against it takes as long as verifying against `reference`,
/// and no presented secret can match it.
pub fn decoy_hash(reference: Option<&str>) -> Result<String> {
    let secret = random_secret()?;
    let reference = reference.filter(|h| is_well_formed(h));

    match reference.and_then(|h| HashScheme::detect(h).map(|scheme| (scheme, h))) {
        Some((HashScheme::Argon2, h)) => {
            let argon2 = argon2_matching(h)?;
            hash_argon2_with(&argon2, &secret)
        }
        Some((HashScheme::Bcrypt, h)) => {
            hash_bcrypt(&secret, bcrypt_cost(h).unwrap_or(DEFAULT_BCRYPT_COST))
        }
        None => hash_bcrypt(&secret, DEFAULT_BCRYPT_COST),
    }
}

/// Parse the cost of a structurally valid bcrypt hash
fn bcrypt_cost(hash: &str) -> Option<u32> {
    if hash.len() != BCRYPT_HASH_LEN || !hash.is_ascii() {
        return None;
    }
    if &hash[6..7] != "$" {
        return None;
    }
    let digest_ok = hash[7..]
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'/');
    if !digest_ok {
        return None;
    }
    hash[4..6]
        .parse::<u32>()
        .ok()
        .filter(|cost| BCRYPT_COSTS.contains(cost))
}

/// Build an Argon2 context from a complete PHC string.
///
/// Fails unless the string carries a salt, an output and in-range params.
fn argon2_matching(hash: &str) -> Result<Argon2<'static>> {
    let parsed =
        PasswordHash::new(hash).map_err(|e| Error::Hash(format!("invalid argon2 hash: {}", e)))?;
    if parsed.salt.is_none() || parsed.hash.is_none() {
        return Err(Error::Hash("argon2 hash is missing its salt or output".into()));
    }
    let algorithm = Algorithm::try_from(parsed.algorithm)
        .map_err(|e| Error::Hash(format!("invalid argon2 algorithm: {}", e)))?;
    let version = parsed
        .version
        .map(Version::try_from)
        .transpose()
        .map_err(|e| Error::Hash(format!("invalid argon2 version: {}", e)))?
        .unwrap_or_default();
    let params = Params::try_from(&parsed)
        .map_err(|e| Error::Hash(format!("invalid argon2 params: {}", e)))?;

    Ok(Argon2::new(algorithm, version, params))
}

fn random_secret() -> Result<String> {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| Error::Hash(format!("random generation failed: {}", e)))?;
    Ok(STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn test_detect_scheme() {
        let bcrypt = hash_bcrypt("secret", TEST_COST).unwrap();
        assert_eq!(HashScheme::detect(&bcrypt), Some(HashScheme::Bcrypt));
        assert_eq!(
            HashScheme::detect("$2y$05$abcdefghijklmnopqrstuv"),
            Some(HashScheme::Bcrypt)
        );
        assert_eq!(
            HashScheme::detect("$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"),
            Some(HashScheme::Argon2)
        );
        assert_eq!(HashScheme::detect("{SHA}W6ph5Mm5Pz8GgiULbPgzG37mj9g="), None);
        assert_eq!(HashScheme::detect("plaintext"), None);
    }

    #[test]
    fn test_scheme_from_str() {
        assert_eq!("bcrypt".parse::<HashScheme>().unwrap(), HashScheme::Bcrypt);
        assert_eq!("Argon2id".parse::<HashScheme>().unwrap(), HashScheme::Argon2);
        assert!("md5".parse::<HashScheme>().is_err());
    }

    #[test]
    fn test_bcrypt_verify() {
        let hash = hash_bcrypt("secret", TEST_COST).unwrap();
        assert!(is_well_formed(&hash));
        assert!(verify_secret("secret", &hash));
        assert!(!verify_secret("Secret", &hash));
        assert!(!verify_secret("", &hash));
    }

    #[test]
    fn test_argon2_verify() {
        let hash = hash_argon2("correct_password").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(is_well_formed(&hash));
        assert!(verify_secret("correct_password", &hash));
        assert!(!verify_secret("wrong_password", &hash));
    }

    #[test]
    fn test_malformed_hashes() {
        for hash in [
            "",
            "not_a_hash",
            "$2b$",
            "$2b$04$tooshort",
            "$2b$99$abcdefghijklmnopqrstuvabcdefghijklmnopqrstuvwxyz01234",
            "$argon2id$garbage",
            "$argon2id$v=19$m=19456,t=2,p=1",
            "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ",
            "$argon2id$v=19$m=1,t=1,p=1$c2FsdHNhbHQ$aGFzaGhhc2hoYXNoaGFzaA",
            "$argon2xx$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaGhhc2hoYXNoaGFzaA",
        ] {
            assert!(!is_well_formed(hash), "{} should be malformed", hash);
            assert!(!verify_secret("anything", hash));
        }
    }

    #[test]
    fn test_decoy_matches_bcrypt_cost() {
        let reference = hash_bcrypt("secret", 5).unwrap();
        let decoy = decoy_hash(Some(&reference)).unwrap();
        assert_eq!(HashScheme::detect(&decoy), Some(HashScheme::Bcrypt));
        assert_eq!(&decoy[4..6], "05");
        assert!(!verify_secret("secret", &decoy));
    }

    #[test]
    fn test_decoy_matches_argon2_params() {
        let reference = hash_argon2("secret").unwrap();
        let decoy = decoy_hash(Some(&reference)).unwrap();
        let params = |h: &str| {
            let parsed = PasswordHash::new(h).unwrap();
            Params::try_from(&parsed).unwrap()
        };
        assert_eq!(params(&decoy), params(&reference));
        assert_ne!(decoy, reference);
    }

    #[test]
    fn test_work_factor() {
        let low = hash_bcrypt("secret", 4).unwrap();
        let high = hash_bcrypt("secret", 6).unwrap();
        assert_eq!(work_factor(&low), Some(16));
        assert_eq!(work_factor(&high), Some(64));

        let argon2 = hash_argon2("secret").unwrap();
        let params = Params::default();
        assert_eq!(
            work_factor(&argon2),
            Some(u64::from(params.m_cost()) * u64::from(params.t_cost()))
        );

        assert_eq!(work_factor("$argon2id$garbage"), None);
        assert_eq!(work_factor("plaintext"), None);
    }

    #[test]
    fn test_decoy_without_reference() {
        let decoy = decoy_hash(Some("garbage")).unwrap();
        assert!(is_well_formed(&decoy));
        assert_eq!(HashScheme::detect(&decoy), Some(HashScheme::Bcrypt));
    }
}
