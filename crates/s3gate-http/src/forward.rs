//! Forwarding allowed requests to the backend.
//!
//! The outgoing request keeps the inbound method, path, query, headers, and body; the
//! body streams through without buffering. The response is relayed as-is apart from an
//! optional [`ResponseTransform`]. Nothing is retried.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::request::Parts;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, error};

use s3gate_core::Deadline;

use crate::body::GatewayBody;
use crate::target::BackendTarget;

/// Why the backend call failed.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// The connection to the backend could not be established.
    #[error("failed to connect to backend: {0}")]
    Connect(String),

    /// The connection failed after it was established.
    #[error("backend transport error: {0}")]
    Transport(String),

    /// No response headers before the deadline.
    #[error("backend did not respond in time")]
    Timeout,

    /// The backend URL or the rewritten request URI is invalid.
    #[error("invalid backend target: {0}")]
    InvalidTarget(String),
}

/// A hook applied to every backend response before it is returned to the client.
pub trait ResponseTransform: Send + Sync + fmt::Debug {
    /// Transform a response. The body may still be streaming.
    fn transform(&self, response: http::Response<GatewayBody>) -> http::Response<GatewayBody>;
}

/// Returns responses unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl ResponseTransform for IdentityTransform {
    fn transform(&self, response: http::Response<GatewayBody>) -> http::Response<GatewayBody> {
        response
    }
}

/// Transport settings for the backend connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwarderTimeouts {
    /// TCP connect bound.
    pub connect: Duration,
    /// How long idle connections are kept for reuse.
    pub pool_idle: Duration,
    /// Wait for response headers after the request is sent.
    pub response_header: Duration,
}

impl Default for ForwarderTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            pool_idle: Duration::from_secs(60),
            response_header: Duration::from_secs(30),
        }
    }
}

/// Sends requests to the backend over a shared keep-alive connection pool.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, GatewayBody>,
    target: BackendTarget,
    response_header_timeout: Duration,
    transform: Arc<dyn ResponseTransform>,
}

impl fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forwarder")
            .field("target", &self.target)
            .field("response_header_timeout", &self.response_header_timeout)
            .field("transform", &self.transform)
            .finish_non_exhaustive()
    }
}

impl Forwarder {
    /// Build a forwarder for `target`.
    #[must_use]
    pub fn new(target: BackendTarget, timeouts: ForwarderTimeouts) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeouts.connect));
        connector.set_keepalive(Some(timeouts.pool_idle));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(timeouts.pool_idle)
            .build(connector);

        Self {
            client,
            target,
            response_header_timeout: timeouts.response_header,
            transform: Arc::new(IdentityTransform),
        }
    }

    /// Replace the response transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Arc<dyn ResponseTransform>) -> Self {
        self.transform = transform;
        self
    }

    /// The backend target.
    #[must_use]
    pub fn target(&self) -> &BackendTarget {
        &self.target
    }

    /// Point request parts at the backend.
    ///
    /// # Errors
    ///
    /// Returns [`ForwardError::InvalidTarget`] if the rewritten URI is invalid.
    pub fn retarget(&self, mut parts: Parts) -> Result<Parts, ForwardError> {
        parts.uri = self.target.rewrite(&parts.uri)?;
        Ok(parts)
    }

    /// Send a prepared request and wait for the response headers.
    ///
    /// The wait is bounded by the response-header timeout and by `deadline`, whichever
    /// is sooner. Dropping the returned future cancels the backend call.
    pub async fn send(
        &self,
        parts: Parts,
        body: GatewayBody,
        deadline: Deadline,
    ) -> Result<http::Response<GatewayBody>, ForwardError> {
        let method = parts.method.clone();
        let uri = parts.uri.clone();
        let request = http::Request::from_parts(parts, body);

        let bound = deadline.tighten(self.response_header_timeout);
        let response = match bound
            .run("waiting for backend response", self.client.request(request))
            .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(err)) if err.is_connect() => {
                error!(%method, %uri, error = %err, "failed to connect to backend");
                return Err(ForwardError::Connect(err.to_string()));
            }
            Ok(Err(err)) => {
                error!(%method, %uri, error = %err, "backend request failed");
                return Err(ForwardError::Transport(err.to_string()));
            }
            Err(_) => {
                error!(%method, %uri, "backend response timed out");
                return Err(ForwardError::Timeout);
            }
        };

        debug!(%method, %uri, status = %response.status(), "backend responded");
        Ok(self.transform.transform(response.map(GatewayBody::Streaming)))
    }
}
