//! Request decomposition: bucket, key, query parameters, and scope.
//!
//! Path-style addressing only: the bucket is the first path segment and the key is
//! everything after the first `/` that follows it.

use percent_encoding::percent_decode_str;

/// The level of the storage namespace a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// No bucket: service-wide requests such as `ListBuckets`.
    Global,
    /// A bucket without a key.
    Bucket,
    /// An object inside a bucket.
    Object,
}

/// Multi-valued query parameters in request order.
///
/// A parameter may appear without a value (`?cors`); presence alone is significant for
/// such flags, so it is stored with an empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// Parse a raw query string with standard URL decoding.
    ///
    /// # Examples
    ///
    /// ```
    /// use s3gate_classify::QueryParams;
    ///
    /// let q = QueryParams::parse("cors&prefix=a%2Fb&tag=1&tag=2");
    /// assert!(q.has("cors"));
    /// assert_eq!(q.first("prefix"), Some("a/b"));
    /// assert_eq!(q.all("tag").collect::<Vec<_>>(), vec!["1", "2"]);
    /// ```
    #[must_use]
    pub fn parse(query: &str) -> Self {
        Self(
            form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        )
    }

    /// Whether the parameter is present, with or without a value.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.0.iter().any(|(k, _)| k == name)
    }

    /// The first value of the parameter.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The first value of the parameter, if it is present and not empty.
    #[must_use]
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.first(name).filter(|v| !v.is_empty())
    }

    /// Every value of the parameter, in request order.
    pub fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All pairs in request order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of pairs, counting repeated names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for QueryParams {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Everything the classifier needs to know about a request, derived once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    method: http::Method,
    bucket: String,
    key: String,
    query: QueryParams,
}

impl RequestDescriptor {
    /// Decompose a request target.
    ///
    /// Percent-decodes the path, strips a single leading `/`, and splits the rest on the
    /// first `/`, so an encoded `%2F` separates bucket and key like a literal one. Never
    /// fails; an empty path yields the global scope.
    ///
    /// # Examples
    ///
    /// ```
    /// use http::Method;
    /// use s3gate_classify::{RequestDescriptor, Scope};
    ///
    /// let req = RequestDescriptor::decompose(Method::DELETE, "/bucket/my/test/key", Some("uploadId=2"));
    /// assert_eq!(req.bucket(), "bucket");
    /// assert_eq!(req.key(), "my/test/key");
    /// assert_eq!(req.scope(), Scope::Object);
    /// ```
    #[must_use]
    pub fn decompose(method: http::Method, path: &str, query: Option<&str>) -> Self {
        let decoded = decode_uri_component(path);
        let trimmed = decoded.strip_prefix('/').unwrap_or(&decoded);
        let (bucket, key) = trimmed.split_once('/').unwrap_or((trimmed, ""));

        Self {
            method,
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            query: QueryParams::parse(query.unwrap_or("")),
        }
    }

    /// Decompose the method and URI of an `http` request.
    #[must_use]
    pub fn from_request<B>(req: &http::Request<B>) -> Self {
        Self::decompose(req.method().clone(), req.uri().path(), req.uri().query())
    }

    /// Decompose request parts.
    #[must_use]
    pub fn from_parts(parts: &http::request::Parts) -> Self {
        Self::decompose(parts.method.clone(), parts.uri.path(), parts.uri.query())
    }

    /// The HTTP method.
    #[must_use]
    pub fn method(&self) -> &http::Method {
        &self.method
    }

    /// The bucket, empty for the global scope.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The object key, empty unless the scope is [`Scope::Object`].
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The query parameters.
    #[must_use]
    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    /// The scope implied by which of bucket and key are present.
    #[must_use]
    pub fn scope(&self) -> Scope {
        match (self.bucket.is_empty(), self.key.is_empty()) {
            (true, _) => Scope::Global,
            (false, true) => Scope::Bucket,
            (false, false) => Scope::Object,
        }
    }

    /// The resource path handed to the policy evaluator: `bucket`, `bucket/key`, or
    /// empty for the global scope.
    #[must_use]
    pub fn resource(&self) -> String {
        match self.scope() {
            Scope::Global => String::new(),
            Scope::Bucket => self.bucket.clone(),
            Scope::Object => format!("{}/{}", self.bucket, self.key),
        }
    }
}

/// Decode a percent-encoded URI component.
fn decode_uri_component(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}
