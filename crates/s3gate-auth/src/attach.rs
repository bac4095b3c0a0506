//! Backend credential attachment.
//!
//! Before a request leaves for the backend, everything that belonged to the client hop
//! is removed: hop-by-hop headers, the client's signature headers, and presigned-URL
//! query parameters. A [`CredentialAttacher`] then adds what the backend needs.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use http::header::{self, HeaderName, HeaderValue};
use http::request::Parts;
use tracing::debug;

use crate::credentials::BackendCredentialProvider;
use crate::error::AuthError;
use crate::sigv4::{SigningParams, TIMESTAMP_FORMAT, UNSIGNED_PAYLOAD, sign};

/// Headers that describe one connection and must not be forwarded.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "upgrade",
];

/// Client signature headers, invalid once the request is re-addressed.
pub const CLIENT_SIGNATURE_HEADERS: &[&str] =
    &["authorization", "x-amz-date", "x-amz-security-token"];

const CONTENT_SHA256: &str = "x-amz-content-sha256";
const SECURITY_TOKEN: &str = "x-amz-security-token";

/// Prepares an outgoing request for the backend.
///
/// `parts.uri` already targets the backend when this is called.
pub trait CredentialAttacher: Send + Sync + fmt::Debug {
    /// Rewrite the request parts.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the request cannot be prepared, e.g. when its payload
    /// signing mode cannot be re-signed.
    fn attach(&self, parts: Parts) -> Result<Parts, AuthError>;
}

/// Strips client-hop state and rewrites `host`, without adding credentials.
///
/// Used when the backend accepts unsigned requests or sits behind its own
/// authenticating layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughAttacher;

impl CredentialAttacher for PassthroughAttacher {
    fn attach(&self, parts: Parts) -> Result<Parts, AuthError> {
        strip_client_state(parts)
    }
}

/// Re-signs requests with the gateway's backend credentials.
#[derive(Clone)]
pub struct SigV4Attacher {
    credentials: Arc<dyn BackendCredentialProvider>,
    region: String,
    service: String,
}

impl fmt::Debug for SigV4Attacher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigV4Attacher")
            .field("region", &self.region)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

impl SigV4Attacher {
    /// Sign for the `s3` service in `region`.
    #[must_use]
    pub fn new(credentials: Arc<dyn BackendCredentialProvider>, region: impl Into<String>) -> Self {
        Self {
            credentials,
            region: region.into(),
            service: "s3".to_owned(),
        }
    }

    /// Attach credentials as of `now`.
    ///
    /// # Errors
    ///
    /// See [`CredentialAttacher::attach`].
    pub fn attach_at(&self, parts: Parts, now: DateTime<Utc>) -> Result<Parts, AuthError> {
        let mut parts = strip_client_state(parts)?;
        let creds = self.credentials.credentials()?;

        let payload_hash = backend_payload_hash(&parts)?;
        let headers = &mut parts.headers;
        headers.insert(CONTENT_SHA256, header_value(&payload_hash)?);
        headers.insert("x-amz-date", header_value(&now.format(TIMESTAMP_FORMAT).to_string())?);

        let mut signed = vec!["host", CONTENT_SHA256, "x-amz-date"];
        if let Some(token) = &creds.session_token {
            headers.insert(SECURITY_TOKEN, header_value(token)?);
            signed.push(SECURITY_TOKEN);
        }

        let params = SigningParams {
            access_key_id: &creds.access_key_id,
            secret_access_key: &creds.secret_access_key,
            region: &self.region,
            service: &self.service,
            time: now,
        };
        let authorization = sign(&parts, &signed, &payload_hash, &params)?;
        parts
            .headers
            .insert(header::AUTHORIZATION, header_value(&authorization)?);

        debug!(
            access_key_id = %creds.access_key_id,
            payload_hash = %payload_hash,
            "signed backend request"
        );
        Ok(parts)
    }
}

impl CredentialAttacher for SigV4Attacher {
    fn attach(&self, parts: Parts) -> Result<Parts, AuthError> {
        self.attach_at(parts, Utc::now())
    }
}

/// Remove hop-by-hop and client signature headers, drop presigned-URL query
/// parameters, and set `host` to the URI's authority.
///
/// Headers listed in the client's `Connection` header are hop-by-hop too.
/// `transfer-encoding` is kept because the body is streamed as received.
///
/// # Errors
///
/// Returns [`AuthError::InvalidRequest`] if the rewritten URI or `host` is invalid.
pub fn strip_client_state(mut parts: Parts) -> Result<Parts, AuthError> {
    let listed: Vec<HeaderName> = parts
        .headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed {
        parts.headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS.iter().chain(CLIENT_SIGNATURE_HEADERS) {
        parts.headers.remove(*name);
    }

    if let Some(query) = parts.uri.query() {
        let kept = strip_presigned_params(query);
        if kept.len() != query.len() {
            parts.uri = replace_query(&parts.uri, &kept)?;
        }
    }

    if let Some(authority) = parts.uri.authority() {
        let host = header_value(authority.as_str())?;
        parts.headers.insert(header::HOST, host);
    }

    Ok(parts)
}

/// Remove `X-Amz-*` pairs from a raw query string, keeping everything else verbatim.
///
/// # Examples
///
/// ```
/// use s3gate_auth::attach::strip_presigned_params;
///
/// assert_eq!(
///     strip_presigned_params("X-Amz-Signature=ab&versionId=3&X-Amz-Date=1"),
///     "versionId=3"
/// );
/// ```
#[must_use]
pub fn strip_presigned_params(query: &str) -> String {
    query
        .split('&')
        .filter(|pair| {
            let name = pair.split('=').next().unwrap_or_default();
            !name
                .get(..6)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case("x-amz-"))
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn replace_query(uri: &http::Uri, query: &str) -> Result<http::Uri, AuthError> {
    let mut builder = http::Uri::builder();
    if let Some(scheme) = uri.scheme() {
        builder = builder.scheme(scheme.clone());
    }
    if let Some(authority) = uri.authority() {
        builder = builder.authority(authority.clone());
    }
    let path_and_query = if query.is_empty() {
        uri.path().to_owned()
    } else {
        format!("{}?{query}", uri.path())
    };
    builder
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| AuthError::InvalidRequest(e.to_string()))
}

/// The payload hash to sign the backend request with.
///
/// Concrete client hashes and unsigned placeholders carry over unchanged; an absent
/// header means the body is unsigned. Chunk-signed streaming bodies embed signatures
/// tied to the client's key and cannot be forwarded under ours.
fn backend_payload_hash(parts: &Parts) -> Result<String, AuthError> {
    let Some(value) = parts.headers.get(CONTENT_SHA256) else {
        return Ok(UNSIGNED_PAYLOAD.to_owned());
    };
    let value = value
        .to_str()
        .map_err(|_| AuthError::InvalidRequest(format!("invalid {CONTENT_SHA256} header")))?;

    if value.starts_with("STREAMING-") && value != "STREAMING-UNSIGNED-PAYLOAD-TRAILER" {
        return Err(AuthError::StreamingPayloadUnsupported(value.to_owned()));
    }
    Ok(value.to_owned())
}

fn header_value(value: &str) -> Result<HeaderValue, AuthError> {
    HeaderValue::from_str(value).map_err(|e| AuthError::InvalidRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::credentials::{CredentialProvider, StaticBackendCredentials, StaticCredentialProvider};
    use crate::sigv4::verify_authorization;

    const BACKEND_KEY: &str = "BACKENDKEY";
    const BACKEND_SECRET: &str = "backend-secret";

    fn client_parts(uri: &str) -> Parts {
        http::Request::builder()
            .method("PUT")
            .uri(uri)
            .header("host", "gateway.local:8080")
            .header("authorization", "AWS4-HMAC-SHA256 Credential=CLIENT/...")
            .header("x-amz-date", "20200101T000000Z")
            .header("x-amz-security-token", "client-token")
            .header("connection", "keep-alive, x-custom-hop")
            .header("keep-alive", "timeout=5")
            .header("x-custom-hop", "1")
            .header("proxy-authorization", "Basic abc")
            .header("transfer-encoding", "chunked")
            .header("content-type", "text/plain")
            .body(())
            .expect("valid request")
            .into_parts()
            .0
    }

    fn attacher(token: Option<&str>) -> SigV4Attacher {
        SigV4Attacher::new(
            Arc::new(StaticBackendCredentials::new(
                BACKEND_KEY,
                BACKEND_SECRET,
                token.map(str::to_owned),
            )),
            "us-east-1",
        )
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
            .single()
            .expect("valid time")
    }

    #[test]
    fn test_should_strip_client_hop_state() {
        let parts = PassthroughAttacher
            .attach(client_parts("http://backend:9000/bucket/key?X-Amz-Credential=a&tagging"))
            .expect("attached");

        for name in [
            "authorization",
            "x-amz-date",
            "x-amz-security-token",
            "connection",
            "keep-alive",
            "x-custom-hop",
            "proxy-authorization",
        ] {
            assert!(!parts.headers.contains_key(name), "{name} should be stripped");
        }
        assert_eq!(parts.headers["transfer-encoding"], "chunked");
        assert_eq!(parts.headers["content-type"], "text/plain");
        assert_eq!(parts.headers["host"], "backend:9000");
        assert_eq!(parts.uri.to_string(), "http://backend:9000/bucket/key?tagging");
    }

    #[test]
    fn test_should_drop_query_when_only_presign_params() {
        let parts = PassthroughAttacher
            .attach(client_parts(
                "http://backend:9000/bucket/key?X-Amz-Algorithm=AWS4-HMAC-SHA256&X-Amz-Signature=00",
            ))
            .expect("attached");
        assert_eq!(parts.uri.to_string(), "http://backend:9000/bucket/key");
    }

    #[test]
    fn test_should_keep_query_byte_identical_without_presign_params() {
        let parts = PassthroughAttacher
            .attach(client_parts("http://backend:9000/bucket?list-type=2&prefix=a%2Fb&delimiter=%2F"))
            .expect("attached");
        assert_eq!(parts.uri.query(), Some("list-type=2&prefix=a%2Fb&delimiter=%2F"));
    }

    #[test]
    fn test_should_sign_for_backend_verifiably() {
        let parts = attacher(None)
            .attach_at(client_parts("http://backend:9000/bucket/key?tagging"), fixed_time())
            .expect("attached");

        assert_eq!(parts.headers["x-amz-date"], "20240301T120000Z");
        assert_eq!(parts.headers[CONTENT_SHA256], UNSIGNED_PAYLOAD);
        assert!(!parts.headers.contains_key(SECURITY_TOKEN));

        let auth = parts.headers["authorization"].to_str().expect("ascii").to_owned();
        assert!(auth.starts_with("AWS4-HMAC-SHA256 Credential=BACKENDKEY/20240301/us-east-1/s3/"));
        assert!(auth.contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date,"));

        let backend_store: &dyn CredentialProvider = &StaticCredentialProvider::new(vec![(
            BACKEND_KEY.to_owned(),
            BACKEND_SECRET.to_owned(),
        )]);
        let scope = verify_authorization(&parts, &auth, UNSIGNED_PAYLOAD, backend_store)
            .expect("backend accepts the signature");
        assert_eq!(scope.access_key_id, BACKEND_KEY);
    }

    #[test]
    fn test_should_attach_session_token() {
        let parts = attacher(Some("session"))
            .attach_at(client_parts("http://backend:9000/bucket"), fixed_time())
            .expect("attached");
        assert_eq!(parts.headers[SECURITY_TOKEN], "session");
        let auth = parts.headers["authorization"].to_str().expect("ascii");
        assert!(auth.contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date;x-amz-security-token,"));
    }

    #[test]
    fn test_should_keep_concrete_payload_hash() {
        let mut parts = client_parts("http://backend:9000/bucket/key");
        let hash = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        parts.headers.insert(CONTENT_SHA256, HeaderValue::from_static(hash));
        let parts = attacher(None).attach_at(parts, fixed_time()).expect("attached");
        assert_eq!(parts.headers[CONTENT_SHA256], hash);
    }

    #[test]
    fn test_should_keep_unsigned_trailer_payload() {
        let mut parts = client_parts("http://backend:9000/bucket/key");
        parts.headers.insert(
            CONTENT_SHA256,
            HeaderValue::from_static("STREAMING-UNSIGNED-PAYLOAD-TRAILER"),
        );
        let parts = attacher(None).attach_at(parts, fixed_time()).expect("attached");
        assert_eq!(parts.headers[CONTENT_SHA256], "STREAMING-UNSIGNED-PAYLOAD-TRAILER");
    }

    #[test]
    fn test_should_reject_chunk_signed_payload() {
        let mut parts = client_parts("http://backend:9000/bucket/key");
        parts.headers.insert(
            CONTENT_SHA256,
            HeaderValue::from_static("STREAMING-AWS4-HMAC-SHA256-PAYLOAD"),
        );
        let result = attacher(None).attach_at(parts, fixed_time());
        assert!(matches!(result, Err(AuthError::StreamingPayloadUnsupported(_))));
    }
}
