//! Error types for identity resolution and credential attachment.

/// Errors raised while authenticating a caller or re-signing a request for the backend.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The `Authorization` header could not be parsed.
    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    /// The signing algorithm is not supported (only AWS4-HMAC-SHA256 is supported).
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A header named in `SignedHeaders` is missing or not valid text.
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    /// The `Credential` component is not `AKID/date/region/service/aws4_request`.
    #[error("Invalid credential format")]
    InvalidCredential,

    /// The access key ID is not in the client credential store.
    #[error("Access key not found: {0}")]
    AccessKeyNotFound(String),

    /// The computed signature does not match the provided signature.
    #[error("Signature does not match")]
    SignatureDoesNotMatch,

    /// The presigned URL has expired.
    #[error("Request has expired")]
    RequestExpired,

    /// A presigned-URL query parameter is missing or malformed.
    #[error("Missing required query parameter: {0}")]
    MissingQueryParam(String),

    /// The client signed its payload chunk by chunk, which cannot be re-signed for the
    /// backend without buffering the whole body.
    #[error("Signed streaming payloads are not supported: {0}")]
    StreamingPayloadUnsupported(String),

    /// No backend credentials are available.
    #[error("Backend credentials unavailable: {0}")]
    CredentialsUnavailable(String),

    /// The rewritten request target is not a valid URI or header value.
    #[error("Invalid outgoing request: {0}")]
    InvalidRequest(String),
}

impl AuthError {
    /// Whether the error means the client could not be authenticated, as opposed to a
    /// failure preparing the outgoing request.
    #[must_use]
    pub fn is_authentication_failure(&self) -> bool {
        !matches!(
            self,
            Self::StreamingPayloadUnsupported(_)
                | Self::CredentialsUnavailable(_)
                | Self::InvalidRequest(_)
        )
    }
}
