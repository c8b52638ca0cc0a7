//! HTTP Basic credentials

use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose::STANDARD, Engine as _};

const BASIC_PREFIX: &str = "Basic ";

/// Identity and secret presented in an `Authorization: Basic` header
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub identity: String,
    pub secret: String,
}

impl BasicCredentials {
    /// Extract credentials from request headers.
    ///
    /// Returns `None` when the header is missing or cannot be decoded; the
    /// caller answers both with an authentication challenge.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        Self::parse(value)
    }

    /// Parse an `Authorization` header value
    pub fn parse(value: &str) -> Option<Self> {
        let scheme = value.get(..BASIC_PREFIX.len())?;
        if !scheme.eq_ignore_ascii_case(BASIC_PREFIX) {
            return None;
        }

        let decoded = STANDARD.decode(&value[BASIC_PREFIX.len()..]).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (identity, secret) = decoded.split_once(':')?;

        Some(Self {
            identity: identity.to_string(),
            secret: secret.to_string(),
        })
    }

    /// Render as an `Authorization` header value
    pub fn to_header_value(&self) -> String {
        let raw = format!("{}:{}", self.identity, self.secret);
        format!("{}{}", BASIC_PREFIX, STANDARD.encode(raw))
    }
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn creds(identity: &str, secret: &str) -> BasicCredentials {
        BasicCredentials {
            identity: identity.to_string(),
            secret: secret.to_string(),
        }
    }

    #[test]
    fn test_parse_basic() {
        // alice:secret
        let parsed = BasicCredentials::parse("Basic YWxpY2U6c2VjcmV0").unwrap();
        assert_eq!(parsed, creds("alice", "secret"));
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        assert!(BasicCredentials::parse("basic YWxpY2U6c2VjcmV0").is_some());
        assert!(BasicCredentials::parse("BASIC YWxpY2U6c2VjcmV0").is_some());
    }

    #[test]
    fn test_secret_may_contain_colons() {
        let header = creds("alice", "pa:ss:word").to_header_value();
        let parsed = BasicCredentials::parse(&header).unwrap();
        assert_eq!(parsed.identity, "alice");
        assert_eq!(parsed.secret, "pa:ss:word");
    }

    #[test]
    fn test_empty_secret() {
        let parsed = BasicCredentials::parse(&creds("alice", "").to_header_value()).unwrap();
        assert_eq!(parsed.secret, "");
    }

    #[test]
    fn test_rejects_malformed() {
        for value in [
            "",
            "Basic",
            "Bearer YWxpY2U6c2VjcmV0",
            "Basic !!!not-base64!!!",
            // "alice" without a colon
            "Basic YWxpY2U=",
        ] {
            assert!(BasicCredentials::parse(value).is_none(), "{:?}", value);
        }
    }

    #[test]
    fn test_from_headers() {
        let mut headers = HeaderMap::new();
        assert!(BasicCredentials::from_headers(&headers).is_none());

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic YWxpY2U6c2VjcmV0"),
        );
        assert_eq!(
            BasicCredentials::from_headers(&headers),
            Some(creds("alice", "secret"))
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", creds("alice", "hunter2"));
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }
}
