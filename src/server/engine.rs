//! File-serving engine
//!
//! The engine owns everything past the access decision: WebDAV method
//! handling, the on-disk layout under its root, and locking. Requests reach
//! it unmodified and its responses go back to the client verbatim.

use std::path::PathBuf;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use dav_server::{localfs::LocalFs, memls::MemLs, DavHandler};

/// Serves authorized requests
#[async_trait]
pub trait FileEngine: Send + Sync + 'static {
    /// Handle a request that has already passed the access gate
    async fn serve(&self, request: Request<Body>) -> Response;
}

/// WebDAV engine rooted at a base directory with an in-memory lock system
#[derive(Clone)]
pub struct DavEngine {
    root: PathBuf,
    handler: DavHandler,
}

impl DavEngine {
    /// Create an engine serving files under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let handler = DavHandler::builder()
            .filesystem(LocalFs::new(&root, false, false, false))
            .locksystem(MemLs::new())
            .build_handler();

        Self { root, handler }
    }

    /// Directory the engine serves from
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

#[async_trait]
impl FileEngine for DavEngine {
    async fn serve(&self, request: Request<Body>) -> Response {
        self.handler.handle(request).await.into_response()
    }
}

impl std::fmt::Debug for DavEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DavEngine").field("root", &self.root).finish()
    }
}
