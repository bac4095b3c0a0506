//! Classification errors.
//!
//! A classification error means the request's shape is not recognized. It is a client
//! error, never a server fault, and a request that fails classification never reaches
//! the backend.

/// The request shape does not map to any known action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    /// Only `GET` (`ListBuckets`) is valid without a bucket.
    #[error("unexpected method on the global level: {0}")]
    UnsupportedGlobalMethod(http::Method),

    /// The method and query parameters do not identify a bucket-level action.
    #[error("unknown bucket-level action for method {0}")]
    UnknownBucketLevelAction(http::Method),

    /// The method and query parameters do not identify an object-level action.
    #[error("unknown object-level action for method {0}")]
    UnknownObjectLevelAction(http::Method),
}

impl ClassifyError {
    /// A stable identifier for the error kind, used in logs and deny reasons.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedGlobalMethod(_) => "UnsupportedGlobalMethod",
            Self::UnknownBucketLevelAction(_) => "UnknownBucketLevelAction",
            Self::UnknownObjectLevelAction(_) => "UnknownObjectLevelAction",
        }
    }
}
