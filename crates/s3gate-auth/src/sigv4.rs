//! AWS Signature Version 4: header parsing, signing key derivation, signing, and
//! verification.
//!
//! Verification follows the usual flow:
//!
//! 1. Parse the `Authorization` header into credential scope, signed headers, and
//!    signature.
//! 2. Rebuild the canonical request from the request parts.
//! 3. Derive the signing key from the secret and the credential scope.
//! 4. Compare the expected signature to the provided one in constant time.
//!
//! [`sign`] runs the same steps forward to produce an `Authorization` value for a
//! request the gateway sends to the backend.

use chrono::{DateTime, Utc};
use hmac::{Hmac, KeyInit, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::canonical::{CanonicalRequest, signed_header_values, signed_headers_string};
use crate::credentials::CredentialProvider;
use crate::error::AuthError;

/// The only algorithm supported.
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Payload placeholder for bodies whose hash is not part of the signature.
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// `x-amz-date` / `X-Amz-Date` timestamp format.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

type HmacSha256 = Hmac<Sha256>;

/// The credential scope of a signature: `AKID/date/region/service/aws4_request`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialScope {
    /// The access key ID.
    pub access_key_id: String,
    /// `YYYYMMDD`.
    pub date: String,
    /// Signing region.
    pub region: String,
    /// Signing service, `s3` for storage requests.
    pub service: String,
}

impl CredentialScope {
    /// Parse a `Credential` value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredential`] unless the value has five `/`-separated
    /// parts ending in `aws4_request`.
    ///
    /// # Examples
    ///
    /// ```
    /// use s3gate_auth::sigv4::CredentialScope;
    ///
    /// let scope = CredentialScope::parse("AKID/20130524/us-east-1/s3/aws4_request").unwrap();
    /// assert_eq!(scope.access_key_id, "AKID");
    /// assert_eq!(scope.scope(), "20130524/us-east-1/s3/aws4_request");
    /// ```
    pub fn parse(credential: &str) -> Result<Self, AuthError> {
        let parts: Vec<&str> = credential.splitn(5, '/').collect();
        match parts.as_slice() {
            [akid, date, region, service, "aws4_request"] if !akid.is_empty() => Ok(Self {
                access_key_id: (*akid).to_owned(),
                date: (*date).to_owned(),
                region: (*region).to_owned(),
                service: (*service).to_owned(),
            }),
            _ => Err(AuthError::InvalidCredential),
        }
    }

    /// The scope string without the access key: `date/region/service/aws4_request`.
    #[must_use]
    pub fn scope(&self) -> String {
        format!("{}/{}/{}/aws4_request", self.date, self.region, self.service)
    }
}

/// Parsed components of a SigV4 `Authorization` header.
#[derive(Debug, Clone)]
pub struct ParsedAuthorization {
    /// Credential scope, including the access key ID.
    pub credential: CredentialScope,
    /// Signed header names, lowercase.
    pub signed_headers: Vec<String>,
    /// Hex-encoded signature.
    pub signature: String,
}

/// Parse an `Authorization` header value.
///
/// # Errors
///
/// Returns [`AuthError::InvalidAuthHeader`] if a component is missing,
/// [`AuthError::UnsupportedAlgorithm`] for anything but `AWS4-HMAC-SHA256`, and
/// [`AuthError::InvalidCredential`] for a malformed credential scope.
pub fn parse_authorization(header: &str) -> Result<ParsedAuthorization, AuthError> {
    let (algorithm, rest) = header
        .trim()
        .split_once(' ')
        .ok_or(AuthError::InvalidAuthHeader)?;
    if algorithm != ALGORITHM {
        return Err(AuthError::UnsupportedAlgorithm(algorithm.to_owned()));
    }

    let mut credential = None;
    let mut signed_headers = None;
    let mut signature = None;
    for part in rest.split(',') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix("Credential=") {
            credential = Some(value);
        } else if let Some(value) = part.strip_prefix("SignedHeaders=") {
            signed_headers = Some(value);
        } else if let Some(value) = part.strip_prefix("Signature=") {
            signature = Some(value);
        }
    }

    let credential = CredentialScope::parse(credential.ok_or(AuthError::InvalidAuthHeader)?)?;
    let signed_headers = signed_headers
        .ok_or(AuthError::InvalidAuthHeader)?
        .split(';')
        .map(str::to_ascii_lowercase)
        .collect();
    let signature = signature.ok_or(AuthError::InvalidAuthHeader)?.to_owned();

    Ok(ParsedAuthorization {
        credential,
        signed_headers,
        signature,
    })
}

/// The SigV4 string to sign.
///
/// # Examples
///
/// ```
/// use s3gate_auth::sigv4::string_to_sign;
///
/// let sts = string_to_sign("20130524T000000Z", "20130524/us-east-1/s3/aws4_request", "abc");
/// assert_eq!(sts, "AWS4-HMAC-SHA256\n20130524T000000Z\n20130524/us-east-1/s3/aws4_request\nabc");
/// ```
#[must_use]
pub fn string_to_sign(timestamp: &str, scope: &str, canonical_request_hash: &str) -> String {
    format!("{ALGORITHM}\n{timestamp}\n{scope}\n{canonical_request_hash}")
}

/// Derive the signing key:
///
/// ```text
/// DateKey              = HMAC-SHA256("AWS4" + secret, date)
/// DateRegionKey        = HMAC-SHA256(DateKey, region)
/// DateRegionServiceKey = HMAC-SHA256(DateRegionKey, service)
/// SigningKey           = HMAC-SHA256(DateRegionServiceKey, "aws4_request")
/// ```
#[must_use]
pub fn derive_signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let date_key = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let region_key = hmac_sha256(&date_key, region.as_bytes());
    let service_key = hmac_sha256(&region_key, service.as_bytes());
    hmac_sha256(&service_key, b"aws4_request")
}

/// Hex-encoded HMAC-SHA256 of `data` under `signing_key`.
#[must_use]
pub fn compute_signature(signing_key: &[u8], data: &str) -> String {
    hex::encode(hmac_sha256(signing_key, data.as_bytes()))
}

/// Hex-encoded SHA-256 of a payload, for `x-amz-content-sha256`.
#[must_use]
pub fn hash_payload(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// Constant-time comparison of two hex signatures.
#[must_use]
pub fn signatures_match(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

/// Verify a header-signed request.
///
/// `payload_hash` is the value the client declared in `x-amz-content-sha256`; the body
/// is streamed, so its actual digest is never computed here. Returns the verified
/// credential scope.
///
/// # Errors
///
/// Returns an [`AuthError`] if the header is malformed, the access key is unknown, a
/// signed header is missing, or the signature does not match.
pub fn verify_authorization(
    parts: &http::request::Parts,
    auth_header: &str,
    payload_hash: &str,
    credentials: &dyn CredentialProvider,
) -> Result<CredentialScope, AuthError> {
    let parsed = parse_authorization(auth_header)?;
    let secret = credentials.get_secret_key(&parsed.credential.access_key_id)?;

    let timestamp = parts
        .headers
        .get("x-amz-date")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AuthError::MissingHeader("x-amz-date".to_owned()))?;

    let signed: Vec<&str> = parsed.signed_headers.iter().map(String::as_str).collect();
    let canonical = CanonicalRequest {
        method: parts.method.as_str(),
        path: parts.uri.path(),
        query: parts.uri.query().unwrap_or(""),
        headers: signed_header_values(&parts.headers, &signed)?,
        signed_headers: signed.clone(),
        payload_hash,
    };

    let scope = &parsed.credential;
    let sts = string_to_sign(timestamp, &scope.scope(), &canonical.hash());
    let key = derive_signing_key(&secret, &scope.date, &scope.region, &scope.service);
    let expected = compute_signature(&key, &sts);

    if signatures_match(&expected, &parsed.signature) {
        debug!(access_key_id = %scope.access_key_id, "header signature verified");
        Ok(parsed.credential)
    } else {
        debug!(access_key_id = %scope.access_key_id, "header signature mismatch");
        Err(AuthError::SignatureDoesNotMatch)
    }
}

/// Inputs for signing an outgoing request.
#[derive(Debug, Clone, Copy)]
pub struct SigningParams<'a> {
    /// Access key ID.
    pub access_key_id: &'a str,
    /// Secret access key.
    pub secret_access_key: &'a str,
    /// Signing region.
    pub region: &'a str,
    /// Signing service.
    pub service: &'a str,
    /// Signing time.
    pub time: DateTime<Utc>,
}

/// Compute the `Authorization` header value for a request.
///
/// Every header in `signed_headers` must already be present in `parts`, including
/// `host`, `x-amz-date` (matching `params.time`), and `x-amz-content-sha256`.
///
/// # Errors
///
/// Returns [`AuthError::MissingHeader`] if a signed header is absent.
pub fn sign(
    parts: &http::request::Parts,
    signed_headers: &[&str],
    payload_hash: &str,
    params: &SigningParams<'_>,
) -> Result<String, AuthError> {
    let canonical = CanonicalRequest {
        method: parts.method.as_str(),
        path: parts.uri.path(),
        query: parts.uri.query().unwrap_or(""),
        headers: signed_header_values(&parts.headers, signed_headers)?,
        signed_headers: signed_headers.to_vec(),
        payload_hash,
    };

    let date = params.time.format("%Y%m%d").to_string();
    let timestamp = params.time.format(TIMESTAMP_FORMAT).to_string();
    let scope = format!("{date}/{}/{}/aws4_request", params.region, params.service);
    let sts = string_to_sign(&timestamp, &scope, &canonical.hash());
    let key = derive_signing_key(params.secret_access_key, &date, params.region, params.service);
    let signature = compute_signature(&key, &sts);

    Ok(format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={}, Signature={signature}",
        params.access_key_id,
        signed_headers_string(signed_headers),
    ))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac =
        <HmacSha256 as KeyInit>::new_from_slice(key).expect("HMAC can accept keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
