//! Flat-file credential store
//!
//! File format (htpasswd style, byte-compatible with Radicale user files):
//! ```text
//! alice:$2y$05$...
//! bob:$argon2id$v=19$m=19456,t=2,p=1$...
//! ```
//!
//! One record per line, identity and hash separated by a single `:`.
//! Blank lines are skipped. Anything else is a hard error for the whole file.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Separates identities from hashes
pub const FIELD_SEPARATOR: char = ':';

/// Separates records
pub const LINE_SEPARATOR: char = '\n';

/// If the credential file is larger than this, it is not a flat credential file
pub const MAX_CREDENTIAL_FILE_SIZE: u64 = 8 * 1024 * 1024;

/// Identity -> secret hash mapping loaded from a credential file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialStore {
    records: BTreeMap<String, String>,
}

impl CredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a credential file, refusing files larger than `max_size` bytes
    pub fn from_file(path: &Path, max_size: u64) -> Result<Self> {
        let unreadable = |source: std::io::Error| Error::SourceUnreadable {
            path: path.display().to_string(),
            source,
        };
        let too_large = |size: u64| Error::SourceTooLarge {
            path: path.display().to_string(),
            size,
            limit: max_size,
        };

        let size = std::fs::metadata(path).map_err(unreadable)?.len();
        if size > max_size {
            return Err(too_large(size));
        }

        // The file may have grown between stat and read
        let bytes = std::fs::read(path).map_err(unreadable)?;
        if bytes.len() as u64 > max_size {
            return Err(too_large(bytes.len() as u64));
        }

        let store = Self::parse(&bytes)?;
        tracing::debug!("Loaded {} credential records from {}", store.len(), path.display());
        Ok(store)
    }

    /// Parse credential records from raw file bytes
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut records = BTreeMap::new();

        for (index, raw) in bytes.split(|b| *b == LINE_SEPARATOR as u8).enumerate() {
            let line_num = index + 1;

            let line = match std::str::from_utf8(raw) {
                Ok(line) => trim_ascii(line),
                Err(_) => {
                    return Err(Error::MalformedRecord {
                        line: line_num,
                        content: trim_ascii(&String::from_utf8_lossy(raw)).to_string(),
                        fields: 0,
                    });
                }
            };

            if line.is_empty() {
                continue;
            }

            let (identity, hash) = parse_line(line, line_num)?;

            if records.contains_key(identity) {
                return Err(Error::DuplicateIdentity {
                    line: line_num,
                    identity: identity.to_string(),
                });
            }

            records.insert(identity.to_string(), hash.to_string());
        }

        Ok(Self { records })
    }

    /// Look up the stored hash for an identity
    #[inline]
    pub fn lookup(&self, identity: &str) -> Option<&str> {
        self.records.get(identity).map(String::as_str)
    }

    /// Render every record as `identity:hash\n`, ordered by identity
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for (identity, hash) in &self.records {
            bytes.extend_from_slice(identity.as_bytes());
            bytes.push(FIELD_SEPARATOR as u8);
            bytes.extend_from_slice(hash.as_bytes());
            bytes.push(LINE_SEPARATOR as u8);
        }
        bytes
    }

    /// Write the store to a file, creating or overwriting it
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))?;
        }

        Ok(())
    }

    /// Insert or replace a record.
    ///
    /// Returns the previous hash if the identity already existed.
    pub fn insert(&mut self, identity: &str, hash: &str) -> Result<Option<String>> {
        let identity = trim_ascii(identity);
        let hash = trim_ascii(hash);
        let invalid = |reason: String| Error::InvalidRecord {
            identity: identity.to_string(),
            reason,
        };

        if identity.is_empty() {
            return Err(invalid("identity cannot be empty".into()));
        }
        for (name, value) in [("identity", identity), ("hash", hash)] {
            if value.contains(FIELD_SEPARATOR) || value.contains(LINE_SEPARATOR) {
                return Err(invalid(format!("{} cannot contain ':' or a line break", name)));
            }
        }

        Ok(self.records.insert(identity.to_string(), hash.to_string()))
    }

    /// Remove a record, returning its hash if it existed
    pub fn remove(&mut self, identity: &str) -> Option<String> {
        self.records.remove(identity)
    }

    /// Iterate identities in serialization order
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Get the number of records
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromStr for CredentialStore {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s.as_bytes())
    }
}

/// Strip ASCII whitespace (including `\r` and tabs) from both ends
fn trim_ascii(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_ascii_whitespace())
}

/// Split a trimmed, non-empty line into identity and hash
fn parse_line(line: &str, line_num: usize) -> Result<(&str, &str)> {
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).map(trim_ascii).collect();

    match fields.as_slice() {
        [identity, hash] => Ok((*identity, *hash)),
        _ => Err(Error::MalformedRecord {
            line: line_num,
            content: line.to_string(),
            fields: fields.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_records() {
        let store: CredentialStore = "alice:$2y$05$hash-a\nbob:$2y$05$hash-b\n".parse().unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.lookup("alice"), Some("$2y$05$hash-a"));
        assert_eq!(store.lookup("bob"), Some("$2y$05$hash-b"));
        assert_eq!(store.lookup("carol"), None);
    }

    #[test]
    fn test_parse_skips_blank_lines_and_trims() {
        let input = "\n   \n  alice :  hash-a  \r\n\n\tbob:hash-b\n\n";
        let store = CredentialStore::parse(input.as_bytes()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.lookup("alice"), Some("hash-a"));
        assert_eq!(store.lookup("bob"), Some("hash-b"));
    }

    #[test]
    fn test_parse_keeps_non_ascii_whitespace() {
        let input = "alice:\u{a0}hash-a\u{2003}\n";
        let store = CredentialStore::parse(input.as_bytes()).unwrap();
        assert_eq!(store.lookup("alice"), Some("\u{a0}hash-a\u{2003}"));
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(CredentialStore::parse(b"").unwrap().is_empty());
        assert!(CredentialStore::parse(b"\n\n \n").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_records() {
        for (input, expected_line, expected_fields) in [
            ("alice", 1, 1),
            ("alice:hash:extra", 1, 3),
            ("alice:hash\n\nbob", 3, 1),
            ("alice:hash\nbob:a:b:c\n", 2, 4),
        ] {
            match CredentialStore::parse(input.as_bytes()) {
                Err(Error::MalformedRecord {
                    line,
                    content,
                    fields,
                }) => {
                    assert_eq!(line, expected_line, "input {:?}", input);
                    assert_eq!(fields, expected_fields, "input {:?}", input);
                    assert!(input.contains(&content));
                }
                other => panic!("expected MalformedRecord for {:?}, got {:?}", input, other),
            }
        }
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let input = b"alice:hash\n\xff\xfe:hash\n";
        match CredentialStore::parse(input) {
            Err(Error::MalformedRecord { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected MalformedRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_identity() {
        let input = "alice:one\nbob:two\n alice : three\n";
        match CredentialStore::parse(input.as_bytes()) {
            Err(Error::DuplicateIdentity { line, identity }) => {
                assert_eq!(line, 3);
                assert_eq!(identity, "alice");
            }
            other => panic!("expected DuplicateIdentity, got {:?}", other),
        }
    }

    #[test]
    fn test_serialize_sorted() {
        let store: CredentialStore = "zed:h3\nalice:h1\n\nbob : h2\n".parse().unwrap();
        let bytes = store.to_bytes();
        assert_eq!(bytes, b"alice:h1\nbob:h2\nzed:h3\n".to_vec());
        assert_eq!(CredentialStore::parse(&bytes).unwrap(), store);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let hashes = [
            "$2y$05$abcdefghijklmnopqrstuu5Yh0ldOdZD1fSyc0.dK9rS9LgMgqGm6",
            "$2b$12$0123456789./ABCDEFGHIJabcdefghijKLMNOPQRSTklmnopqrstu",
            "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaGhhc2hoYXNoaGFzaA",
            "{SHA}W6ph5Mm5Pz8GgiULbPgzG37mj9g=",
            "x",
        ];

        for count in 0..=50usize {
            let mut store = CredentialStore::new();
            for i in 0..count {
                let identity = format!("user{:02}.{}", (i * 37) % 101, i);
                let hash = format!("{}{}", hashes[i % hashes.len()], i);
                store.insert(&identity, &hash).unwrap();
            }
            assert_eq!(store.len(), count);

            let bytes = store.to_bytes();
            assert_eq!(
                bytes.iter().filter(|b| **b == LINE_SEPARATOR as u8).count(),
                count
            );

            let parsed = CredentialStore::parse(&bytes).unwrap();
            assert_eq!(parsed, store, "{} records", count);
            assert_eq!(parsed.to_bytes(), bytes);
        }
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "alice:hash-a").unwrap();
        writeln!(file, "bob:hash-b").unwrap();

        let store = CredentialStore::from_file(file.path(), MAX_CREDENTIAL_FILE_SIZE).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.lookup("bob"), Some("hash-b"));
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = CredentialStore::from_file(&dir.path().join("users"), MAX_CREDENTIAL_FILE_SIZE)
            .unwrap_err();
        assert!(matches!(err, Error::SourceUnreadable { .. }));
        assert!(err.is_load_error());
    }

    #[test]
    fn test_from_file_too_large_is_not_parsed() {
        // Malformed content proves the size check runs before parsing
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[b'x'; 64]).unwrap();
        file.flush().unwrap();

        match CredentialStore::from_file(file.path(), 32) {
            Err(Error::SourceTooLarge { size, limit, .. }) => {
                assert_eq!(size, 64);
                assert_eq!(limit, 32);
            }
            other => panic!("expected SourceTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users");

        let mut store = CredentialStore::new();
        store.insert("alice", "hash-a").unwrap();
        store.insert("bob", "hash-b").unwrap();
        store.write_to_file(&path).unwrap();

        let loaded = CredentialStore::from_file(&path, MAX_CREDENTIAL_FILE_SIZE).unwrap();
        assert_eq!(loaded, store);
    }

    #[test]
    fn test_insert_and_remove() {
        let mut store = CredentialStore::new();
        assert_eq!(store.insert("alice", "one").unwrap(), None);
        assert_eq!(store.insert("alice", "two").unwrap(), Some("one".to_string()));
        for (identity, hash) in [
            ("", "hash"),
            ("  ", "hash"),
            ("a:b", "hash"),
            ("carol", "line\nbreak"),
        ] {
            match store.insert(identity, hash) {
                Err(Error::InvalidRecord { .. }) => {}
                other => panic!("expected InvalidRecord for {:?}, got {:?}", identity, other),
            }
        }

        assert_eq!(store.identities().collect::<Vec<_>>(), vec!["alice"]);
        assert_eq!(store.remove("alice"), Some("two".to_string()));
        assert!(store.is_empty());
    }
}
