//! HTTP Server
//!
//! Routes every path and method through the [`Dispatcher`].

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    Router,
};
use tower_http::trace::TraceLayer;

use super::dispatcher::Dispatcher;
use crate::config::ServerConfig;
use crate::error::{Error, Result};

/// HTTP front end for the dispatcher
pub struct HttpServer {
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(config: ServerConfig, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Create the router. WebDAV paths and methods are open-ended, so
    /// everything lands on the fallback.
    pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
        Router::new()
            .fallback(handle_request)
            .layer(TraceLayer::new_for_http())
            .with_state(dispatcher)
    }

    /// Serve until `shutdown` resolves
    pub async fn start_with_shutdown<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = Self::router(Arc::clone(&self.dispatcher));

        let listener = tokio::net::TcpListener::bind(&self.config.bind_address).await?;
        tracing::info!("davgate listening on {}", self.config.bind_address);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::Network(format!("HTTP server error: {}", e)))?;

        Ok(())
    }

    /// Serve until Ctrl+C
    pub async fn start(&self) -> Result<()> {
        self.start_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Received shutdown signal");
        })
        .await
    }
}

async fn handle_request(
    State(dispatcher): State<Arc<Dispatcher>>,
    request: Request<Body>,
) -> Response {
    dispatcher.dispatch(request).await
}
