//! HTTP server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::client::RouteClassifier;
use super::middleware::with_rate_limit;
use super::service;
use crate::error::{GatehouseError, Result};
use crate::ratelimit::{RateLimitBackend, RateLimiter};

/// HTTP server for the decision service.
pub struct HttpServer<R: RateLimitBackend + 'static> {
    /// Address to bind to
    addr: SocketAddr,
    /// The rate limiter instance
    rate_limiter: Arc<R>,
    /// Decides which budget a request path falls under
    classifier: RouteClassifier,
    /// Application routes placed behind the rate limiting middleware
    protected: Option<Router>,
}

impl HttpServer<RateLimiter> {
    /// Create a new HTTP server around a local rate limiter.
    pub fn new(addr: SocketAddr, rate_limiter: Arc<RateLimiter>) -> Self {
        Self::with_backend(addr, rate_limiter)
    }
}

impl<R: RateLimitBackend + 'static> HttpServer<R> {
    /// Create a new HTTP server around any rate limit backend.
    pub fn with_backend(addr: SocketAddr, rate_limiter: Arc<R>) -> Self {
        Self {
            addr,
            rate_limiter,
            classifier: RouteClassifier::default(),
            protected: None,
        }
    }

    /// Use `classifier` to pick the admin budget for request paths.
    pub fn with_route_classifier(mut self, classifier: RouteClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Serve `routes` alongside the decision service, each request checked
    /// against the limiter first.
    pub fn with_protected_routes(mut self, routes: Router) -> Self {
        self.protected = Some(routes);
        self
    }

    /// Assemble the full application router.
    pub fn router(&self) -> Router {
        let app = service::router(Arc::clone(&self.rate_limiter), self.classifier.clone());
        match &self.protected {
            Some(routes) => app.merge(with_rate_limit(
                routes.clone(),
                Arc::clone(&self.rate_limiter),
                self.classifier.clone(),
            )),
            None => app,
        }
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            error!(addr = %self.addr, error = %e, "Failed to bind HTTP listener");
            e
        })?;

        info!(
            addr = %listener.local_addr()?,
            admin_prefix = %self.classifier.admin_prefix(),
            protected_routes = self.protected.is_some(),
            "Starting HTTP server with graceful shutdown"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                GatehouseError::Io(e)
            })
    }
}
