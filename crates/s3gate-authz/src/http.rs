//! Remote policy evaluation over HTTP.
//!
//! The request is an OPA-style document:
//!
//! ```json
//! {"input": {"identity": {...}, "action": "...", "permission": "...",
//!            "resource": {...}, "context": {...}}}
//! ```
//!
//! and the answer is either `{"result": true}` or
//! `{"result": {"allow": true, "reason": "..."}}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::evaluator::{EvaluatorError, PolicyEvaluator, PolicyRequest, PolicyVerdict};

/// Connection settings for [`HttpPolicyEvaluator`].
#[derive(Clone)]
pub struct HttpPolicyConfig {
    /// Decision endpoint, e.g. `http://opa:8181/v1/data/s3/allow`.
    pub endpoint: String,
    /// Optional bearer token.
    pub auth_token: Option<String>,
    /// Whole-call timeout.
    pub timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// How long idle pooled connections are kept.
    pub pool_idle_timeout: Duration,
}

impl std::fmt::Debug for HttpPolicyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPolicyConfig")
            .field("endpoint", &self.endpoint)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("pool_idle_timeout", &self.pool_idle_timeout)
            .finish()
    }
}

/// Evaluates requests against a remote decision service.
#[derive(Clone)]
pub struct HttpPolicyEvaluator {
    client: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl std::fmt::Debug for HttpPolicyEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPolicyEvaluator")
            .field("endpoint", &self.endpoint)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpPolicyEvaluator {
    /// Build an evaluator with a pooled client.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluatorError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: HttpPolicyConfig) -> Result<Self, EvaluatorError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Some(config.pool_idle_timeout))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| EvaluatorError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint,
            auth_token: config.auth_token.filter(|t| !t.is_empty()),
        })
    }

    /// The decision endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PolicyEvaluator for HttpPolicyEvaluator {
    async fn evaluate(&self, request: &PolicyRequest) -> Result<PolicyVerdict, EvaluatorError> {
        let payload = build_input(request, &chrono::Utc::now().to_rfc3339());

        let mut call = self.client.post(&self.endpoint).json(&payload);
        if let Some(token) = &self.auth_token {
            call = call.bearer_auth(token);
        }

        let resp = call
            .send()
            .await
            .map_err(|e| EvaluatorError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(EvaluatorError::Status(status.as_u16()));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| EvaluatorError::Transport(e.to_string()))?;
        let verdict = parse_verdict(&body)?;
        debug!(
            principal = %request.principal,
            permission = %request.permission,
            allow = verdict.allow,
            "policy evaluated"
        );
        Ok(verdict)
    }
}

/// ARN-style resource name: `arn:aws:s3:::bucket[/key]`, or `arn:aws:s3:::*` for the
/// global scope.
#[must_use]
pub fn resource_arn(request: &PolicyRequest) -> String {
    if request.resource.is_empty() {
        "arn:aws:s3:::*".to_owned()
    } else {
        format!("arn:aws:s3:::{}", request.resource)
    }
}

fn build_input(request: &PolicyRequest, timestamp: &str) -> serde_json::Value {
    json!({
        "input": {
            "identity": {
                "principal": request.principal,
                "verified": request.verified,
            },
            "action": request.action,
            "permission": request.permission,
            "resource": {
                "bucket": request.bucket,
                "key": request.key,
                "path": request.resource,
                "arn": resource_arn(request),
            },
            "context": {
                "method": request.method,
                "timestamp": timestamp,
            }
        }
    })
}

#[derive(Deserialize)]
struct DetailedResult {
    allow: bool,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DecisionResult {
    Simple(bool),
    Detailed(DetailedResult),
}

#[derive(Deserialize)]
struct DecisionResponse {
    result: Option<DecisionResult>,
}

fn parse_verdict(body: &[u8]) -> Result<PolicyVerdict, EvaluatorError> {
    let resp: DecisionResponse = serde_json::from_slice(body)
        .map_err(|e| EvaluatorError::InvalidResponse(e.to_string()))?;
    match resp.result {
        Some(DecisionResult::Simple(allow)) => Ok(PolicyVerdict {
            allow,
            reason: None,
        }),
        Some(DecisionResult::Detailed(d)) => Ok(PolicyVerdict {
            allow: d.allow,
            reason: d.reason,
        }),
        // An undefined decision in OPA comes back without `result`.
        None => Ok(PolicyVerdict::deny("policy decision undefined")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(resource: &str, bucket: &str, key: &str) -> PolicyRequest {
        PolicyRequest {
            principal: "AKIDEXAMPLE".to_owned(),
            verified: true,
            action: "DeleteObject".to_owned(),
            permission: "s3:DeleteObject".to_owned(),
            resource: resource.to_owned(),
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            method: "DELETE".to_owned(),
        }
    }

    #[test]
    fn test_should_build_opa_input() {
        let input = build_input(&request("b/k", "b", "k"), "2026-01-01T00:00:00+00:00");
        let doc = &input["input"];
        assert_eq!(doc["identity"]["principal"], "AKIDEXAMPLE");
        assert_eq!(doc["identity"]["verified"], true);
        assert_eq!(doc["action"], "DeleteObject");
        assert_eq!(doc["permission"], "s3:DeleteObject");
        assert_eq!(doc["resource"]["bucket"], "b");
        assert_eq!(doc["resource"]["key"], "k");
        assert_eq!(doc["resource"]["path"], "b/k");
        assert_eq!(doc["resource"]["arn"], "arn:aws:s3:::b/k");
        assert_eq!(doc["context"]["method"], "DELETE");
    }

    #[test]
    fn test_should_use_wildcard_arn_for_global_scope() {
        assert_eq!(resource_arn(&request("", "", "")), "arn:aws:s3:::*");
        assert_eq!(resource_arn(&request("b", "b", "")), "arn:aws:s3:::b");
    }

    #[test]
    fn test_should_parse_simple_result() {
        assert!(parse_verdict(br#"{"result": true}"#).expect("valid").allow);
        assert!(!parse_verdict(br#"{"result": false}"#).expect("valid").allow);
    }

    #[test]
    fn test_should_parse_detailed_result() {
        let verdict = parse_verdict(br#"{"result": {"allow": false, "reason": "read-only"}}"#)
            .expect("valid");
        assert!(!verdict.allow);
        assert_eq!(verdict.reason.as_deref(), Some("read-only"));

        let verdict = parse_verdict(br#"{"result": {"allow": true}}"#).expect("valid");
        assert_eq!(verdict, PolicyVerdict::allow());
    }

    #[test]
    fn test_should_deny_undefined_decision() {
        assert!(!parse_verdict(b"{}").expect("valid").allow);
    }

    #[test]
    fn test_should_reject_malformed_response() {
        assert!(matches!(
            parse_verdict(b"not json"),
            Err(EvaluatorError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_verdict(br#"{"result": "yes"}"#),
            Err(EvaluatorError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_should_fail_when_endpoint_unreachable() {
        let evaluator = HttpPolicyEvaluator::new(HttpPolicyConfig {
            endpoint: "http://127.0.0.1:1/v1/data/s3/allow".to_owned(),
            auth_token: Some("secret".to_owned()),
            timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(1),
            pool_idle_timeout: Duration::from_secs(1),
        })
        .expect("client");
        let err = evaluator
            .evaluate(&request("b", "b", ""))
            .await
            .expect_err("nothing listens on port 1");
        assert!(matches!(err, EvaluatorError::Transport(_)));
    }

    #[test]
    fn test_should_redact_token_in_debug() {
        let config = HttpPolicyConfig {
            endpoint: "http://opa".to_owned(),
            auth_token: Some("secret".to_owned()),
            timeout: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(1),
            pool_idle_timeout: Duration::from_secs(1),
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
    }
}
