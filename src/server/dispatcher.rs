//! Request dispatcher
//!
//! Every request goes through the same steps:
//!
//! ```text
//! credentials present? --no--> Challenge (401 + WWW-Authenticate)
//!        | yes
//! secret valid? --no--> Forbidden
//!        | yes
//! path owned? --no--> Forbidden
//!        | yes
//! method implemented? --no--> NotImplemented (501)
//!        | yes
//! Forward to the file engine
//! ```
//!
//! Nothing is carried between requests.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
};

use super::engine::FileEngine;
use crate::auth::{AccessGate, BasicCredentials};

/// Body sent for every authentication or authorization failure
pub const FORBIDDEN_MESSAGE: &str = "Access to the requested resource forbidden.";

/// Body sent for methods the engine does not implement
pub const NOT_IMPLEMENTED_MESSAGE: &str = "Method not implemented.";

/// Outcome of the access decision for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No usable credentials; ask the client for some
    Challenge,
    /// Credentials rejected or path outside the caller's subtree
    Forbidden,
    /// Allowed, but the engine does not implement the method
    NotImplemented,
    /// Allowed; hand the request to the engine
    Forward,
}

/// Runs requests through the access gate and forwards the allowed ones
pub struct Dispatcher {
    gate: Arc<AccessGate>,
    engine: Arc<dyn FileEngine>,
    challenge: HeaderValue,
    unimplemented: Vec<Method>,
}

impl Dispatcher {
    /// Create a dispatcher.
    ///
    /// Returns `None` if `realm` cannot be used in a header value.
    pub fn new(
        gate: Arc<AccessGate>,
        engine: Arc<dyn FileEngine>,
        realm: &str,
        unimplemented: Vec<Method>,
    ) -> Option<Self> {
        let challenge = HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm)).ok()?;

        Some(Self {
            gate,
            engine,
            challenge,
            unimplemented,
        })
    }

    /// Decide what to do with a request without touching the engine
    pub async fn decide(&self, method: &Method, path: &str, headers: &HeaderMap) -> Verdict {
        let Some(credentials) = BasicCredentials::from_headers(headers) else {
            return Verdict::Challenge;
        };

        let gate = Arc::clone(&self.gate);
        let path = path.to_string();
        let identity = credentials.identity.clone();

        // Hash verification is CPU-bound; keep it off the async workers
        let decision = tokio::task::spawn_blocking(move || {
            gate.check(&credentials.identity, &credentials.secret, &path)
        })
        .await;

        match decision {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(identity = %identity, reason = %e, "Request denied");
                return Verdict::Forbidden;
            }
            Err(e) => {
                tracing::error!("Access check task failed: {}", e);
                return Verdict::Forbidden;
            }
        }

        if self.unimplemented.contains(method) {
            return Verdict::NotImplemented;
        }

        Verdict::Forward
    }

    /// Handle one request end to end
    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let verdict = self
            .decide(request.method(), request.uri().path(), request.headers())
            .await;

        match verdict {
            Verdict::Challenge => self.challenge_response(),
            Verdict::Forbidden => text_response(StatusCode::UNAUTHORIZED, FORBIDDEN_MESSAGE),
            Verdict::NotImplemented => {
                text_response(StatusCode::NOT_IMPLEMENTED, NOT_IMPLEMENTED_MESSAGE)
            }
            Verdict::Forward => self.engine.serve(request).await,
        }
    }

    fn challenge_response(&self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, self.challenge.clone())],
        )
            .into_response()
    }
}

/// Plain-text error response with a trailing newline
fn text_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        format!("{}\n", message),
    )
        .into_response()
}
