//! Canonical actions and the permissions they require.

use std::borrow::Cow;
use std::fmt;

/// The permission a caller must hold to perform an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// A concrete capability identifier such as `s3:ListBucket`.
    Required(&'static str),
    /// No permission mapping exists for the action yet. Always denied.
    Unsupported,
}

impl Permission {
    /// `s3:ListAllMyBuckets`.
    pub const LIST_ALL_MY_BUCKETS: Self = Self::Required("s3:ListAllMyBuckets");
    /// `s3:ListBucket`.
    pub const LIST_BUCKET: Self = Self::Required("s3:ListBucket");
    /// `s3:ListBucketVersions`.
    pub const LIST_BUCKET_VERSIONS: Self = Self::Required("s3:ListBucketVersions");
    /// `s3:CreateBucket`.
    pub const CREATE_BUCKET: Self = Self::Required("s3:CreateBucket");
    /// `s3:DeleteBucket`.
    pub const DELETE_BUCKET: Self = Self::Required("s3:DeleteBucket");
    /// `s3:DeleteObject`.
    pub const DELETE_OBJECT: Self = Self::Required("s3:DeleteObject");
    /// `s3:PutObject`.
    pub const PUT_OBJECT: Self = Self::Required("s3:PutObject");

    /// The identifier, or `UNSUPPORTED` for the sentinel.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required(id) => id,
            Self::Unsupported => "UNSUPPORTED",
        }
    }

    /// Whether this is the `UNSUPPORTED` sentinel.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified request: the canonical S3 action name and its required permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Action {
    name: Cow<'static, str>,
    permission: Permission,
}

impl Action {
    /// An action with a fixed name.
    #[must_use]
    pub const fn new(name: &'static str, permission: Permission) -> Self {
        Self {
            name: Cow::Borrowed(name),
            permission,
        }
    }

    /// An action whose name is composed from a verb and a sub-resource operation,
    /// e.g. `Get` + `BucketCors`.
    #[must_use]
    pub fn composed(verb: &str, operation: &str, suffix: &str, permission: Permission) -> Self {
        Self {
            name: Cow::Owned(format!("{verb}{operation}{suffix}")),
            permission,
        }
    }

    /// The canonical action name, e.g. `ListObjectsV2`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The required permission.
    #[must_use]
    pub fn permission(&self) -> Permission {
        self.permission
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_render_permission_identifiers() {
        assert_eq!(Permission::LIST_BUCKET.as_str(), "s3:ListBucket");
        assert_eq!(Permission::Unsupported.as_str(), "UNSUPPORTED");
        assert!(Permission::Unsupported.is_unsupported());
        assert!(!Permission::CREATE_BUCKET.is_unsupported());
    }

    #[test]
    fn test_should_compose_action_names() {
        let action = Action::composed("List", "MultipartUpload", "s", Permission::Unsupported);
        assert_eq!(action.name(), "ListMultipartUploads");
        assert_eq!(action.to_string(), "ListMultipartUploads (UNSUPPORTED)");
    }
}
