//! Gateway configuration.
//!
//! Provides [`GatewayConfig`] for configuring the s3gate proxy. Values are loaded from
//! environment variables; every field has a default that works for a local backend
//! listening on `127.0.0.1:9000`.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{CoreError, CoreResult};

/// A client access key and its secret, used to verify inbound SigV4 signatures.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCredential {
    /// The access key ID presented by the client.
    pub access_key_id: String,
    /// The secret used to verify the client's signature.
    #[serde(skip_serializing, default)]
    pub secret_access_key: String,
}

impl fmt::Debug for ClientCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .finish()
    }
}

/// s3gate configuration.
///
/// # Examples
///
/// ```
/// use s3gate_core::GatewayConfig;
///
/// let config = GatewayConfig::default();
/// assert_eq!(config.gateway_listen, "0.0.0.0:8080");
/// assert!(config.policy_endpoint.is_none());
/// ```
#[derive(Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Bind address for the proxy (e.g. `"0.0.0.0:8080"`).
    #[builder(default = String::from("0.0.0.0:8080"))]
    pub gateway_listen: String,

    /// Base URL of the S3-compatible backend.
    #[builder(default = String::from("http://127.0.0.1:9000"))]
    pub backend_endpoint: String,

    /// Region used when re-signing requests for the backend.
    #[builder(default = String::from("us-east-1"))]
    pub backend_region: String,

    /// Access key ID for the backend. Requests are forwarded unsigned when absent.
    #[builder(default)]
    pub backend_access_key_id: Option<String>,

    /// Secret access key for the backend.
    #[serde(skip_serializing, default)]
    #[builder(default)]
    pub backend_secret_access_key: Option<String>,

    /// Optional session token for temporary backend credentials.
    #[serde(skip_serializing, default)]
    #[builder(default)]
    pub backend_session_token: Option<String>,

    /// URL of the HTTP policy evaluator. Without it (and without static rules) every
    /// request is denied.
    #[builder(default)]
    pub policy_endpoint: Option<String>,

    /// Bearer token presented to the policy evaluator.
    #[serde(skip_serializing, default)]
    #[builder(default)]
    pub policy_auth_token: Option<String>,

    /// JSON file of static allow/deny rules, used when no policy endpoint is set.
    #[builder(default)]
    pub policy_rules_file: Option<String>,

    /// Upper bound for a single policy evaluation, in milliseconds.
    #[builder(default = 5_000)]
    pub policy_timeout_ms: u64,

    /// End-to-end deadline for a request up to the backend's response headers.
    #[builder(default = 60_000)]
    pub request_timeout_ms: u64,

    /// Backend connect timeout, in milliseconds.
    #[builder(default = 10_000)]
    pub connect_timeout_ms: u64,

    /// How long an idle backend connection is kept for reuse, in milliseconds.
    #[builder(default = 60_000)]
    pub pool_idle_timeout_ms: u64,

    /// How long to wait for the backend's response headers, in milliseconds.
    #[builder(default = 30_000)]
    pub response_header_timeout_ms: u64,

    /// Take the caller identity from the access key without verifying the signature.
    #[builder(default)]
    pub skip_signature_validation: bool,

    /// Client credentials used for signature verification.
    #[builder(default)]
    pub client_credentials: Vec<ClientCredential>,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("gateway_listen", &self.gateway_listen)
            .field("backend_endpoint", &self.backend_endpoint)
            .field("backend_region", &self.backend_region)
            .field("backend_access_key_id", &self.backend_access_key_id)
            .field(
                "backend_secret_access_key",
                &self.backend_secret_access_key.as_ref().map(|_| "***"),
            )
            .field(
                "backend_session_token",
                &self.backend_session_token.as_ref().map(|_| "***"),
            )
            .field("policy_endpoint", &self.policy_endpoint)
            .field(
                "policy_auth_token",
                &self.policy_auth_token.as_ref().map(|_| "***"),
            )
            .field("policy_rules_file", &self.policy_rules_file)
            .field("policy_timeout_ms", &self.policy_timeout_ms)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("pool_idle_timeout_ms", &self.pool_idle_timeout_ms)
            .field("response_header_timeout_ms", &self.response_header_timeout_ms)
            .field("skip_signature_validation", &self.skip_signature_validation)
            .field("client_credentials", &self.client_credentials)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GATEWAY_LISTEN` | `0.0.0.0:8080` |
    /// | `BACKEND_ENDPOINT` | `http://127.0.0.1:9000` |
    /// | `BACKEND_REGION` | `us-east-1` |
    /// | `BACKEND_ACCESS_KEY_ID` | *(unset)* |
    /// | `BACKEND_SECRET_ACCESS_KEY` | *(unset)* |
    /// | `BACKEND_SESSION_TOKEN` | *(unset)* |
    /// | `POLICY_ENDPOINT` | *(unset)* |
    /// | `POLICY_AUTH_TOKEN` | *(unset)* |
    /// | `POLICY_RULES_FILE` | *(unset)* |
    /// | `POLICY_TIMEOUT_MS` | `5000` |
    /// | `REQUEST_TIMEOUT_MS` | `60000` |
    /// | `CONNECT_TIMEOUT_MS` | `10000` |
    /// | `POOL_IDLE_TIMEOUT_MS` | `60000` |
    /// | `RESPONSE_HEADER_TIMEOUT_MS` | `30000` |
    /// | `SKIP_SIGNATURE_VALIDATION` | `false` |
    /// | `CLIENT_CREDENTIALS` | *(unset)*, `AKID:SECRET[,AKID:SECRET...]` |
    /// | `LOG_LEVEL` | `info` |
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] if `CLIENT_CREDENTIALS` is malformed or only one
    /// half of the backend key pair is set.
    pub fn from_env() -> CoreResult<Self> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("GATEWAY_LISTEN") {
            config.gateway_listen = v;
        }
        if let Ok(v) = std::env::var("BACKEND_ENDPOINT") {
            config.backend_endpoint = v;
        }
        if let Ok(v) = std::env::var("BACKEND_REGION") {
            config.backend_region = v;
        }
        config.backend_access_key_id = non_empty_var("BACKEND_ACCESS_KEY_ID");
        config.backend_secret_access_key = non_empty_var("BACKEND_SECRET_ACCESS_KEY");
        config.backend_session_token = non_empty_var("BACKEND_SESSION_TOKEN");
        config.policy_endpoint = non_empty_var("POLICY_ENDPOINT");
        config.policy_auth_token = non_empty_var("POLICY_AUTH_TOKEN");
        config.policy_rules_file = non_empty_var("POLICY_RULES_FILE");

        read_millis("POLICY_TIMEOUT_MS", &mut config.policy_timeout_ms);
        read_millis("REQUEST_TIMEOUT_MS", &mut config.request_timeout_ms);
        read_millis("CONNECT_TIMEOUT_MS", &mut config.connect_timeout_ms);
        read_millis("POOL_IDLE_TIMEOUT_MS", &mut config.pool_idle_timeout_ms);
        read_millis(
            "RESPONSE_HEADER_TIMEOUT_MS",
            &mut config.response_header_timeout_ms,
        );

        if let Ok(v) = std::env::var("SKIP_SIGNATURE_VALIDATION") {
            config.skip_signature_validation = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("CLIENT_CREDENTIALS") {
            config.client_credentials = parse_client_credentials(&v)?;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] when only one half of the backend key pair is set.
    pub fn validate(&self) -> CoreResult<()> {
        if self.backend_access_key_id.is_some() != self.backend_secret_access_key.is_some() {
            return Err(CoreError::Config(
                "BACKEND_ACCESS_KEY_ID and BACKEND_SECRET_ACCESS_KEY must be set together"
                    .to_owned(),
            ));
        }
        Ok(())
    }

    /// Per-call bound for the policy evaluator.
    #[must_use]
    pub fn policy_timeout(&self) -> Duration {
        Duration::from_millis(self.policy_timeout_ms)
    }

    /// End-to-end request deadline.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Backend connect timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Idle connection reuse window.
    #[must_use]
    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.pool_idle_timeout_ms)
    }

    /// Backend response-header wait.
    #[must_use]
    pub fn response_header_timeout(&self) -> Duration {
        Duration::from_millis(self.response_header_timeout_ms)
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Overwrite `target` with the variable's value when it parses; keep the default otherwise.
fn read_millis(name: &str, target: &mut u64) {
    if let Ok(v) = std::env::var(name) {
        if let Ok(n) = v.parse::<u64>() {
            *target = n;
        }
    }
}

/// Parse `AKID:SECRET[,AKID:SECRET...]`.
fn parse_client_credentials(value: &str) -> CoreResult<Vec<ClientCredential>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (access_key_id, secret_access_key) = entry
                .split_once(':')
                .filter(|(akid, secret)| !akid.is_empty() && !secret.is_empty())
                .ok_or_else(|| {
                    CoreError::Config(format!(
                        "invalid CLIENT_CREDENTIALS entry (expected AKID:SECRET): {entry}"
                    ))
                })?;
            Ok(ClientCredential {
                access_key_id: access_key_id.to_owned(),
                secret_access_key: secret_access_key.to_owned(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.gateway_listen, "0.0.0.0:8080");
        assert_eq!(config.backend_endpoint, "http://127.0.0.1:9000");
        assert_eq!(config.backend_region, "us-east-1");
        assert!(config.backend_access_key_id.is_none());
        assert!(config.policy_endpoint.is_none());
        assert!(!config.skip_signature_validation);
        assert!(config.client_credentials.is_empty());
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.pool_idle_timeout(), Duration::from_secs(60));
        assert_eq!(config.response_header_timeout(), Duration::from_secs(30));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_should_build_with_typed_builder() {
        let config = GatewayConfig::builder()
            .gateway_listen("127.0.0.1:9999".into())
            .backend_endpoint("http://minio:9000".into())
            .backend_access_key_id(Some("AKID".into()))
            .backend_secret_access_key(Some("secret".into()))
            .policy_endpoint(Some("http://opa:8181/v1/data/s3/allow".into()))
            .policy_timeout_ms(250)
            .skip_signature_validation(true)
            .build();

        assert_eq!(config.gateway_listen, "127.0.0.1:9999");
        assert_eq!(config.backend_endpoint, "http://minio:9000");
        assert_eq!(config.policy_timeout(), Duration::from_millis(250));
        assert!(config.skip_signature_validation);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_should_reject_half_configured_backend_keys() {
        let config = GatewayConfig::builder()
            .backend_access_key_id(Some("AKID".into()))
            .build();
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_should_serialize_without_secrets() {
        let config = GatewayConfig::builder()
            .backend_access_key_id(Some("AKID".into()))
            .backend_secret_access_key(Some("topsecret".into()))
            .client_credentials(vec![ClientCredential {
                access_key_id: "client".into(),
                secret_access_key: "clientsecret".into(),
            }])
            .build();
        let json = serde_json::to_string(&config).expect("test serialization");
        assert!(json.contains("gatewayListen"));
        assert!(json.contains("backendAccessKeyId"));
        assert!(!json.contains("topsecret"));
        assert!(!json.contains("clientsecret"));
    }

    #[test]
    fn test_should_redact_secrets_in_debug_output() {
        let config = GatewayConfig::builder()
            .backend_access_key_id(Some("AKID".into()))
            .backend_secret_access_key(Some("topsecret".into()))
            .build();
        let debug_str = format!("{config:?}");
        assert!(debug_str.contains("GatewayConfig"));
        assert!(!debug_str.contains("topsecret"));
    }

    #[test]
    fn test_should_parse_client_credentials() {
        let creds = parse_client_credentials("alice:s1, bob:s2,").expect("valid list");
        assert_eq!(creds.len(), 2);
        assert_eq!(creds[0].access_key_id, "alice");
        assert_eq!(creds[1].secret_access_key, "s2");
    }

    #[test]
    fn test_should_reject_malformed_client_credentials() {
        assert!(parse_client_credentials("alice").is_err());
        assert!(parse_client_credentials("alice:").is_err());
        assert!(parse_client_credentials(":secret").is_err());
    }

    #[test]
    fn test_should_parse_bool_values() {
        assert!(parse_bool("1"));
        assert!(parse_bool("true"));
        assert!(parse_bool("TRUE"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }
}
