//! The policy evaluator boundary.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use s3gate_auth::Identity;
use s3gate_classify::{Action, RequestDescriptor};

/// Everything a policy evaluator is asked about a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyRequest {
    /// Caller principal (access key ID or `anonymous`).
    pub principal: String,
    /// Whether the principal's signature was verified.
    pub verified: bool,
    /// Canonical action name, e.g. `ListObjectsV2`.
    pub action: String,
    /// Required permission, e.g. `s3:ListBucket`.
    pub permission: String,
    /// `bucket`, `bucket/key`, or empty for the global scope.
    pub resource: String,
    /// Bucket, empty for the global scope.
    pub bucket: String,
    /// Object key, empty unless the request addresses an object.
    pub key: String,
    /// HTTP method.
    pub method: String,
}

impl PolicyRequest {
    /// Assemble the evaluator input for a classified request.
    #[must_use]
    pub fn new(identity: &Identity, action: &Action, request: &RequestDescriptor) -> Self {
        Self {
            principal: identity.principal().to_owned(),
            verified: identity.is_verified(),
            action: action.name().to_owned(),
            permission: action.permission().as_str().to_owned(),
            resource: request.resource(),
            bucket: request.bucket().to_owned(),
            key: request.key().to_owned(),
            method: request.method().as_str().to_owned(),
        }
    }
}

/// An evaluator's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyVerdict {
    /// Whether the request is allowed.
    pub allow: bool,
    /// Optional explanation, logged and surfaced in deny messages.
    pub reason: Option<String>,
}

impl PolicyVerdict {
    /// An allow verdict.
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allow: true,
            reason: None,
        }
    }

    /// A deny verdict with a reason.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            reason: Some(reason.into()),
        }
    }
}

/// Why an evaluator could not produce a verdict.
#[derive(Debug, thiserror::Error)]
pub enum EvaluatorError {
    /// The evaluator could not be reached.
    #[error("policy evaluator unreachable: {0}")]
    Transport(String),

    /// The evaluator answered with a non-success status.
    #[error("policy evaluator returned status {0}")]
    Status(u16),

    /// The evaluator's answer could not be interpreted.
    #[error("invalid policy evaluator response: {0}")]
    InvalidResponse(String),
}

/// Decides whether a caller may perform an action on a resource.
///
/// Implementations are shared across all requests and must be cheap to call
/// concurrently. The gate bounds each call with the request deadline and drops the
/// future on timeout or client disconnect.
#[async_trait]
pub trait PolicyEvaluator: Send + Sync + fmt::Debug {
    /// Evaluate one request.
    ///
    /// # Errors
    ///
    /// Returns an [`EvaluatorError`] when no verdict can be produced. The gate treats
    /// every error as a deny.
    async fn evaluate(&self, request: &PolicyRequest) -> Result<PolicyVerdict, EvaluatorError>;
}
