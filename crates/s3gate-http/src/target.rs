//! Backend target resolution.

use http::Uri;
use http::uri::{Authority, PathAndQuery, Scheme};

use crate::forward::ForwardError;

/// Where allowed requests are sent: scheme, authority, and an optional base path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTarget {
    scheme: Scheme,
    authority: Authority,
    base_path: String,
}

impl BackendTarget {
    /// Parse a backend base URL such as `http://minio:9000` or `http://10.0.0.5/s3`.
    ///
    /// # Errors
    ///
    /// Returns [`ForwardError::InvalidTarget`] unless the URL is absolute `http` with a
    /// host and no query.
    pub fn parse(endpoint: &str) -> Result<Self, ForwardError> {
        let uri: Uri = endpoint
            .parse()
            .map_err(|e| ForwardError::InvalidTarget(format!("{endpoint}: {e}")))?;

        if uri.scheme() != Some(&Scheme::HTTP) {
            return Err(ForwardError::InvalidTarget(format!(
                "{endpoint}: only http backends are supported"
            )));
        }
        let authority = uri
            .authority()
            .cloned()
            .ok_or_else(|| ForwardError::InvalidTarget(format!("{endpoint}: missing host")))?;
        if uri.query().is_some() {
            return Err(ForwardError::InvalidTarget(format!(
                "{endpoint}: query strings are not allowed"
            )));
        }

        Ok(Self {
            scheme: Scheme::HTTP,
            authority,
            base_path: uri.path().trim_end_matches('/').to_owned(),
        })
    }

    /// The backend authority (`host[:port]`).
    #[must_use]
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Re-address an inbound request URI to the backend, keeping path and query
    /// byte-identical.
    ///
    /// # Errors
    ///
    /// Returns [`ForwardError::InvalidTarget`] if the combined URI is invalid.
    pub fn rewrite(&self, uri: &Uri) -> Result<Uri, ForwardError> {
        let original = uri.path_and_query().map_or("/", PathAndQuery::as_str);
        let path_and_query = if self.base_path.is_empty() {
            original.to_owned()
        } else {
            format!("{}{original}", self.base_path)
        };

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| ForwardError::InvalidTarget(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_rewrite_origin_form_uri() {
        let target = BackendTarget::parse("http://minio:9000").expect("valid");
        let uri: Uri = "/bucket/my%20key?uploadId=2&x=%2F".parse().expect("uri");
        assert_eq!(
            target.rewrite(&uri).expect("rewrite").to_string(),
            "http://minio:9000/bucket/my%20key?uploadId=2&x=%2F"
        );
    }

    #[test]
    fn test_should_prefix_base_path() {
        let target = BackendTarget::parse("http://10.0.0.5/s3/").expect("valid");
        let uri: Uri = "/bucket?acl".parse().expect("uri");
        assert_eq!(
            target.rewrite(&uri).expect("rewrite").to_string(),
            "http://10.0.0.5/s3/bucket?acl"
        );
    }

    #[test]
    fn test_should_replace_absolute_form_authority() {
        let target = BackendTarget::parse("http://backend:9000").expect("valid");
        let uri: Uri = "http://gateway:8080/".parse().expect("uri");
        assert_eq!(
            target.rewrite(&uri).expect("rewrite").to_string(),
            "http://backend:9000/"
        );
    }

    #[test]
    fn test_should_reject_unsupported_endpoints() {
        for endpoint in ["https://s3.amazonaws.com", "minio:9000", "http://", "http://h/?a=b"] {
            assert!(
                BackendTarget::parse(endpoint).is_err(),
                "{endpoint} should be rejected"
            );
        }
    }
}
