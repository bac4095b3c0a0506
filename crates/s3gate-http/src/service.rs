//! The gateway's hyper service.
//!
//! [`GatewayService`] runs every inbound request through the same pipeline:
//!
//! 1. Health check interception (`GET /_health`)
//! 2. Caller identity resolution
//! 3. Decomposition and classification
//! 4. The authorization gate
//! 5. Backend re-addressing and credential attachment
//! 6. Forwarding, with the response relayed back
//! 7. Common response headers (`x-amz-request-id`, `Server`)
//!
//! A single [`Deadline`] bounds steps 4 and 6. Every failure short-circuits with an S3
//! `<Error>` document; nothing reaches the backend unless the gate allowed it.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::service::Service;
use tracing::{debug, info, warn};
use uuid::Uuid;

use s3gate_auth::{CredentialAttacher, IdentityResolver};
use s3gate_authz::{AuthorizationGate, Decision};
use s3gate_classify::{RequestDescriptor, classify};
use s3gate_core::Deadline;

use crate::body::GatewayBody;
use crate::error::GatewayError;
use crate::forward::Forwarder;
use crate::response::{error_to_response, health_check_response, is_health_check};

/// Value of the `Server` response header.
pub const SERVER_NAME: &str = "s3gate";

/// The collaborators and limits of the gateway pipeline.
#[derive(Clone)]
pub struct GatewayHttpConfig {
    /// Derives the caller identity.
    pub identity: IdentityResolver,
    /// Decides whether a request may be forwarded.
    pub gate: AuthorizationGate,
    /// Prepares outgoing requests for the backend.
    pub attacher: Arc<dyn CredentialAttacher>,
    /// Sends requests to the backend.
    pub forwarder: Forwarder,
    /// End-to-end bound from arrival to backend response headers.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for GatewayHttpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayHttpConfig")
            .field("identity", &self.identity)
            .field("gate", &self.gate)
            .field("attacher", &self.attacher)
            .field("forwarder", &self.forwarder)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// The authorizing proxy as a hyper service. Cheap to clone; one clone per connection.
#[derive(Debug, Clone)]
pub struct GatewayService {
    config: Arc<GatewayHttpConfig>,
}

impl GatewayService {
    /// Create a service.
    #[must_use]
    pub fn new(config: GatewayHttpConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Process a request whose body is already a [`GatewayBody`].
    pub async fn handle(&self, req: http::Request<GatewayBody>) -> http::Response<GatewayBody> {
        let request_id = Uuid::new_v4().to_string();
        let response = process_request(req, &self.config, &request_id).await;
        add_common_headers(response, &request_id)
    }
}

impl Service<http::Request<Incoming>> for GatewayService {
    type Response = http::Response<GatewayBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(req.map(GatewayBody::Streaming)).await) })
    }
}

async fn process_request(
    req: http::Request<GatewayBody>,
    config: &GatewayHttpConfig,
    request_id: &str,
) -> http::Response<GatewayBody> {
    let (parts, body) = req.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path().to_owned();
    debug!(%method, uri = %parts.uri, request_id, "processing request");

    if is_health_check(&method, &path) {
        return health_check_response();
    }

    let fail = |err: GatewayError| error_to_response(&err.with_resource(path.clone()), request_id);

    let identity = match config.identity.resolve(&parts) {
        Ok(identity) => identity,
        Err(err) => {
            warn!(%method, %path, error = %err, request_id, "failed to resolve caller identity");
            return fail(GatewayError::from(&err));
        }
    };

    let descriptor = RequestDescriptor::from_parts(&parts);
    let classified = classify(&descriptor);
    let deadline = Deadline::after(config.request_timeout);

    let decision = config
        .gate
        .authorize(&classified, &identity, &descriptor, deadline)
        .await;
    let action = match (&decision, &classified) {
        (Decision::Allow { .. }, Ok(action)) => action,
        (Decision::Deny(reason), _) => return fail(GatewayError::from(reason)),
        // The gate never allows an unclassified request.
        (Decision::Allow { .. }, Err(err)) => return fail(GatewayError::from(err)),
    };

    info!(
        identity = %identity,
        action = %action.name(),
        permission = %action.permission(),
        bucket = descriptor.bucket(),
        key = descriptor.key(),
        request_id,
        "forwarding request"
    );

    let parts = match config.forwarder.retarget(parts) {
        Ok(parts) => parts,
        Err(err) => return fail(GatewayError::from(&err)),
    };
    let parts = match config.attacher.attach(parts) {
        Ok(parts) => parts,
        Err(err) => {
            warn!(error = %err, request_id, "failed to prepare backend request");
            return fail(GatewayError::from(&err));
        }
    };

    match config.forwarder.send(parts, body, deadline).await {
        Ok(response) => response,
        Err(err) => fail(GatewayError::from(&err)),
    }
}

/// Add the gateway's headers without overriding ones the backend set.
fn add_common_headers(
    mut response: http::Response<GatewayBody>,
    request_id: &str,
) -> http::Response<GatewayBody> {
    let headers = response.headers_mut();

    if let Ok(hv) = http::header::HeaderValue::from_str(request_id) {
        headers.entry("x-amz-request-id").or_insert(hv);
    }
    headers
        .entry(http::header::SERVER)
        .or_insert(http::header::HeaderValue::from_static(SERVER_NAME));

    response
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use s3gate_auth::PassthroughAttacher;
    use s3gate_authz::{DenyAllEvaluator, StaticPolicyEvaluator};

    use super::*;
    use crate::forward::ForwarderTimeouts;
    use crate::target::BackendTarget;

    fn service(gate: AuthorizationGate) -> GatewayService {
        GatewayService::new(GatewayHttpConfig {
            identity: IdentityResolver::unverified(),
            gate,
            attacher: Arc::new(PassthroughAttacher),
            forwarder: Forwarder::new(
                BackendTarget::parse("http://127.0.0.1:1").expect("valid target"),
                ForwarderTimeouts::default(),
            ),
            request_timeout: Duration::from_secs(5),
        })
    }

    fn deny_all() -> GatewayService {
        service(AuthorizationGate::new(
            Arc::new(DenyAllEvaluator),
            Duration::from_secs(1),
        ))
    }

    fn request(method: http::Method, uri: &str) -> http::Request<GatewayBody> {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(GatewayBody::empty())
            .expect("valid request")
    }

    async fn body_text(resp: http::Response<GatewayBody>) -> String {
        let bytes = resp
            .into_body()
            .collect()
            .await
            .expect("buffered body")
            .to_bytes();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[tokio::test]
    async fn test_should_answer_health_check_locally() {
        let resp = deny_all().handle(request(http::Method::GET, "/_health")).await;
        assert_eq!(resp.status(), http::StatusCode::OK);
        assert_eq!(
            resp.headers().get("Server").and_then(|v| v.to_str().ok()),
            Some(SERVER_NAME)
        );
        assert!(resp.headers().contains_key("x-amz-request-id"));
    }

    #[tokio::test]
    async fn test_should_treat_health_bucket_as_bucket_listing() {
        let resp = deny_all().handle(request(http::Method::GET, "/health")).await;
        assert_eq!(resp.status(), http::StatusCode::FORBIDDEN);
        assert!(body_text(resp).await.contains("<Resource>/health</Resource>"));
    }

    #[tokio::test]
    async fn test_should_deny_before_forwarding() {
        let resp = deny_all().handle(request(http::Method::GET, "/")).await;
        assert_eq!(resp.status(), http::StatusCode::FORBIDDEN);
        let body = body_text(resp).await;
        assert!(body.contains("<Code>AccessDenied</Code>"));
        assert!(body.contains("<Resource>/</Resource>"));
    }

    #[tokio::test]
    async fn test_should_reject_non_get_on_global_scope() {
        let resp = deny_all().handle(request(http::Method::POST, "/")).await;
        assert_eq!(resp.status(), http::StatusCode::METHOD_NOT_ALLOWED);
        assert!(body_text(resp).await.contains("<Code>MethodNotAllowed</Code>"));
    }

    #[tokio::test]
    async fn test_should_reject_unclassified_object_request() {
        let resp = deny_all()
            .handle(request(http::Method::GET, "/bucket/my/test/key"))
            .await;
        assert_eq!(resp.status(), http::StatusCode::BAD_REQUEST);
        assert!(body_text(resp).await.contains("<Code>InvalidRequest</Code>"));
    }

    #[tokio::test]
    async fn test_should_return_bad_gateway_when_backend_is_down() {
        let allow_all = StaticPolicyEvaluator::from_json(
            r#"[{"effect": "Allow", "principals": ["*"], "permissions": ["*"], "resources": ["*"]}]"#,
        )
        .expect("valid rules");
        let svc = service(AuthorizationGate::new(
            Arc::new(allow_all),
            Duration::from_secs(1),
        ));
        let resp = svc.handle(request(http::Method::GET, "/")).await;
        assert_eq!(resp.status(), http::StatusCode::BAD_GATEWAY);
        assert!(body_text(resp).await.contains("<Code>BadGateway</Code>"));
    }

    #[test]
    fn test_should_not_override_backend_headers() {
        let resp = http::Response::builder()
            .header("x-amz-request-id", "backend-id")
            .header("Server", "MinIO")
            .body(GatewayBody::empty())
            .expect("valid response");
        let resp = add_common_headers(resp, "gateway-id");
        assert_eq!(
            resp.headers()
                .get("x-amz-request-id")
                .and_then(|v| v.to_str().ok()),
            Some("backend-id")
        );
        assert_eq!(
            resp.headers().get("Server").and_then(|v| v.to_str().ok()),
            Some("MinIO")
        );
    }
}
