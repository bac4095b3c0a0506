//! Presigned URL parsing and verification.
//!
//! A presigned URL carries its signature in query parameters (`X-Amz-Algorithm`,
//! `X-Amz-Credential`, `X-Amz-Date`, `X-Amz-Expires`, `X-Amz-SignedHeaders`,
//! `X-Amz-Signature`). The payload is always `UNSIGNED-PAYLOAD`.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use percent_encoding::percent_decode_str;
use tracing::debug;

use crate::canonical::{CanonicalRequest, signed_header_values};
use crate::credentials::CredentialProvider;
use crate::error::AuthError;
use crate::sigv4::{
    ALGORITHM, CredentialScope, TIMESTAMP_FORMAT, UNSIGNED_PAYLOAD, compute_signature,
    derive_signing_key, signatures_match, string_to_sign,
};

/// Query parameter holding the signature; excluded from the canonical query.
const SIGNATURE_PARAM: &str = "X-Amz-Signature";

/// Upper bound on `X-Amz-Expires`: seven days.
const MAX_EXPIRES_SECS: i64 = 7 * 24 * 60 * 60;

/// Parsed presigned-URL parameters.
#[derive(Debug, Clone)]
pub struct PresignedParams {
    /// Credential scope, including the access key ID.
    pub credential: CredentialScope,
    /// `X-Amz-Date`.
    pub timestamp: String,
    /// `X-Amz-Expires`, in seconds.
    pub expires: i64,
    /// Signed header names.
    pub signed_headers: Vec<String>,
    /// Hex-encoded signature.
    pub signature: String,
}

/// Whether a query string carries presigned-URL authentication.
#[must_use]
pub fn is_presigned(query: Option<&str>) -> bool {
    query.is_some_and(|q| {
        q.split('&')
            .any(|pair| pair.split('=').next() == Some("X-Amz-Credential"))
    })
}

/// Parse the presigned-URL parameters of a raw query string.
///
/// # Errors
///
/// Returns [`AuthError::MissingQueryParam`] for a missing or malformed parameter,
/// [`AuthError::UnsupportedAlgorithm`], or [`AuthError::InvalidCredential`].
pub fn parse_presigned(query: &str) -> Result<PresignedParams, AuthError> {
    let params: HashMap<&str, String> = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k, percent_decode_str(v).decode_utf8_lossy().into_owned()))
        .collect();
    let required = |name: &str| {
        params
            .get(name)
            .cloned()
            .ok_or_else(|| AuthError::MissingQueryParam(name.to_owned()))
    };

    let algorithm = required("X-Amz-Algorithm")?;
    if algorithm != ALGORITHM {
        return Err(AuthError::UnsupportedAlgorithm(algorithm));
    }

    let credential = CredentialScope::parse(&required("X-Amz-Credential")?)?;
    let expires = required("X-Amz-Expires")?
        .parse::<i64>()
        .ok()
        .filter(|secs| (1..=MAX_EXPIRES_SECS).contains(secs))
        .ok_or_else(|| AuthError::MissingQueryParam("X-Amz-Expires (out of range)".to_owned()))?;

    Ok(PresignedParams {
        credential,
        timestamp: required("X-Amz-Date")?,
        expires,
        signed_headers: required("X-Amz-SignedHeaders")?
            .split(';')
            .map(str::to_ascii_lowercase)
            .collect(),
        signature: required(SIGNATURE_PARAM)?,
    })
}

/// Verify a presigned request at `now`.
///
/// # Errors
///
/// Returns an [`AuthError`] if parameters are missing, the URL has expired, the access
/// key is unknown, a signed header is missing, or the signature does not match.
pub fn verify_presigned(
    parts: &http::request::Parts,
    credentials: &dyn CredentialProvider,
    now: DateTime<Utc>,
) -> Result<CredentialScope, AuthError> {
    let query = parts.uri.query().unwrap_or("");
    let params = parse_presigned(query)?;
    check_expiration(&params.timestamp, params.expires, now)?;

    let secret = credentials.get_secret_key(&params.credential.access_key_id)?;

    let unsigned_query = query
        .split('&')
        .filter(|pair| pair.split('=').next() != Some(SIGNATURE_PARAM))
        .collect::<Vec<_>>()
        .join("&");
    let signed: Vec<&str> = params.signed_headers.iter().map(String::as_str).collect();
    let canonical = CanonicalRequest {
        method: parts.method.as_str(),
        path: parts.uri.path(),
        query: &unsigned_query,
        headers: signed_header_values(&parts.headers, &signed)?,
        signed_headers: signed.clone(),
        payload_hash: UNSIGNED_PAYLOAD,
    };

    let scope = &params.credential;
    let sts = string_to_sign(&params.timestamp, &scope.scope(), &canonical.hash());
    let key = derive_signing_key(&secret, &scope.date, &scope.region, &scope.service);
    let expected = compute_signature(&key, &sts);

    if signatures_match(&expected, &params.signature) {
        debug!(access_key_id = %scope.access_key_id, "presigned signature verified");
        Ok(params.credential)
    } else {
        debug!(access_key_id = %scope.access_key_id, "presigned signature mismatch");
        Err(AuthError::SignatureDoesNotMatch)
    }
}

fn check_expiration(timestamp: &str, expires: i64, now: DateTime<Utc>) -> Result<(), AuthError> {
    let signed_at = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
        .map_err(|_| AuthError::MissingQueryParam("X-Amz-Date (invalid format)".to_owned()))?
        .and_utc();
    if now > signed_at + chrono::Duration::seconds(expires) {
        return Err(AuthError::RequestExpired);
    }
    Ok(())
}
