//! SigV4 canonical request construction.
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n\n
//! SignedHeaders\n
//! HashedPayload
//! ```
//!
//! The same canonical form is used to verify inbound client signatures and to sign the
//! request forwarded to the backend, so both directions agree on encoding rules.

use std::collections::BTreeMap;
use std::fmt;

use http::HeaderMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use sha2::{Digest, Sha256};

use crate::error::AuthError;

/// Everything except the RFC 3986 unreserved characters is encoded in path segments.
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// The inputs of a SigV4 canonical request.
///
/// `Display` renders the canonical string; [`CanonicalRequest::hash`] returns its
/// hex-encoded SHA-256, which is what the string to sign embeds.
#[derive(Debug, Clone)]
pub struct CanonicalRequest<'a> {
    /// HTTP method, upper case.
    pub method: &'a str,
    /// Raw request path.
    pub path: &'a str,
    /// Raw query string, without the leading `?`.
    pub query: &'a str,
    /// Header name/value pairs. Only those named in `signed_headers` are rendered.
    pub headers: Vec<(&'a str, &'a str)>,
    /// Lowercase names of the signed headers.
    pub signed_headers: Vec<&'a str>,
    /// The payload hash, or a placeholder such as `UNSIGNED-PAYLOAD`.
    pub payload_hash: &'a str,
}

impl CanonicalRequest<'_> {
    /// Hex-encoded SHA-256 of the canonical string.
    #[must_use]
    pub fn hash(&self) -> String {
        hex::encode(Sha256::digest(self.to_string().as_bytes()))
    }
}

impl fmt::Display for CanonicalRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{}\n{}\n{}\n\n{}\n{}",
            self.method,
            canonical_uri(self.path),
            canonical_query_string(self.query),
            canonical_headers(&self.headers, &self.signed_headers),
            signed_headers_string(&self.signed_headers),
            self.payload_hash,
        )
    }
}

/// Canonical URI: each path segment decoded, then encoded with the SigV4 rules.
///
/// Decoding first keeps an already-encoded path from being encoded twice.
///
/// # Examples
///
/// ```
/// use s3gate_auth::canonical::canonical_uri;
///
/// assert_eq!(canonical_uri(""), "/");
/// assert_eq!(canonical_uri("/bucket/a b"), "/bucket/a%20b");
/// assert_eq!(canonical_uri("/bucket/a%20b"), "/bucket/a%20b");
/// ```
#[must_use]
pub fn canonical_uri(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_owned();
    }

    path.split('/')
        .map(|segment| {
            let decoded = percent_decode_str(segment).decode_utf8_lossy();
            utf8_percent_encode(&decoded, URI_ENCODE_SET).to_string()
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Canonical query string: pairs sorted by name, then value.
///
/// Values keep the encoding the client used, since clients disagree on which
/// characters to escape and the signature covers the bytes they actually sent.
/// Flags without a value render as `name=`.
#[must_use]
pub fn canonical_query_string(query: &str) -> String {
    let mut params: Vec<(&str, &str)> = query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|param| param.split_once('=').unwrap_or((param, "")))
        .collect();
    params.sort_unstable();

    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Canonical headers: lowercase names, trimmed values with inner whitespace collapsed,
/// sorted by name. Repeated headers are joined with `,`. No trailing newline.
#[must_use]
pub fn canonical_headers(headers: &[(&str, &str)], signed_headers: &[&str]) -> String {
    let mut by_name: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = collapse_whitespace(value.trim());
        by_name
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    let mut names = signed_headers.to_vec();
    names.sort_unstable();

    names
        .iter()
        .filter_map(|name| by_name.get(*name).map(|value| format!("{name}:{value}")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `SignedHeaders` value: sorted names joined with `;`.
///
/// # Examples
///
/// ```
/// use s3gate_auth::canonical::signed_headers_string;
///
/// assert_eq!(signed_headers_string(&["x-amz-date", "host"]), "host;x-amz-date");
/// ```
#[must_use]
pub fn signed_headers_string(signed_headers: &[&str]) -> String {
    let mut sorted = signed_headers.to_vec();
    sorted.sort_unstable();
    sorted.join(";")
}

/// Collect every value of each signed header from a header map.
///
/// # Errors
///
/// Returns [`AuthError::MissingHeader`] if a signed header is absent or not valid text.
pub fn signed_header_values<'a>(
    headers: &'a HeaderMap,
    signed_headers: &[&'a str],
) -> Result<Vec<(&'a str, &'a str)>, AuthError> {
    let mut pairs = Vec::with_capacity(signed_headers.len());
    for &name in signed_headers {
        let mut found = false;
        for value in headers.get_all(name) {
            let value = value
                .to_str()
                .map_err(|_| AuthError::MissingHeader(name.to_owned()))?;
            pairs.push((name, value));
            found = true;
        }
        if !found {
            return Err(AuthError::MissingHeader(name.to_owned()));
        }
    }
    Ok(pairs)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_should_match_aws_get_object_vector() {
        let request = CanonicalRequest {
            method: "GET",
            path: "/test.txt",
            query: "",
            headers: vec![
                ("host", "examplebucket.s3.amazonaws.com"),
                ("range", "bytes=0-9"),
                ("x-amz-content-sha256", EMPTY_SHA256),
                ("x-amz-date", "20130524T000000Z"),
            ],
            signed_headers: vec!["host", "range", "x-amz-content-sha256", "x-amz-date"],
            payload_hash: EMPTY_SHA256,
        };

        let expected = format!(
            "GET\n/test.txt\n\nhost:examplebucket.s3.amazonaws.com\nrange:bytes=0-9\n\
             x-amz-content-sha256:{EMPTY_SHA256}\nx-amz-date:20130524T000000Z\n\n\
             host;range;x-amz-content-sha256;x-amz-date\n{EMPTY_SHA256}"
        );
        assert_eq!(request.to_string(), expected);
        assert_eq!(
            request.hash(),
            "7344ae5b7ee6c3e7e6b0fe0640412a37625d1fbfff95c48bbb2dc43964946972"
        );
    }

    #[test]
    fn test_should_sort_query_and_render_flags() {
        assert_eq!(canonical_query_string("uploads&b=2&a=1"), "a=1&b=2&uploads=");
        assert_eq!(canonical_query_string(""), "");
    }

    #[test]
    fn test_should_keep_raw_query_encoding() {
        assert_eq!(
            canonical_query_string("events=s3:ObjectCreated:*&prefix=a%2Fb"),
            "events=s3:ObjectCreated:*&prefix=a%2Fb"
        );
    }

    #[test]
    fn test_should_collapse_header_whitespace() {
        let headers = [("Host", "  example.com  "), ("X-Custom", "a   b \t c")];
        assert_eq!(
            canonical_headers(&headers, &["x-custom", "host"]),
            "host:example.com\nx-custom:a b c"
        );
    }

    #[test]
    fn test_should_join_repeated_header_values() {
        let mut map = HeaderMap::new();
        map.append("x-amz-meta-tag", "a".parse().expect("valid value"));
        map.append("x-amz-meta-tag", "b".parse().expect("valid value"));
        let pairs = signed_header_values(&map, &["x-amz-meta-tag"]).expect("present");
        assert_eq!(canonical_headers(&pairs, &["x-amz-meta-tag"]), "x-amz-meta-tag:a,b");
    }

    #[test]
    fn test_should_report_missing_signed_header() {
        let map = HeaderMap::new();
        let result = signed_header_values(&map, &["host"]);
        assert!(matches!(result, Err(AuthError::MissingHeader(name)) if name == "host"));
    }

    #[test]
    fn test_should_encode_reserved_characters_in_path() {
        assert_eq!(canonical_uri("/bucket/a+b=c"), "/bucket/a%2Bb%3Dc");
        assert_eq!(canonical_uri("/bucket/dir/"), "/bucket/dir/");
    }
}
