//! Action classification: (scope, method, query) to canonical action and permission.
//!
//! The classifier is a pure function over a [`RequestDescriptor`]. It performs no I/O
//! and reads only the static tables in [`crate::table`], so it is safe to call from any
//! number of tasks concurrently.
//!
//! Decision order at each level is fixed:
//!
//! - scope (global, bucket, object)
//! - HTTP method
//! - query-parameter presence, checked in the order the tables declare

use http::Method;
use tracing::debug;

use crate::action::{Action, Permission};
use crate::error::ClassifyError;
use crate::request::{QueryParams, RequestDescriptor, Scope};
use crate::table::{BUCKET_SUBRESOURCES, LISTABLE_BUCKET_SUBRESOURCES, OBJECT_SUBRESOURCES};

/// Classify a request into its canonical action and required permission.
///
/// # Errors
///
/// Returns a [`ClassifyError`] when the combination of scope, method and query
/// parameters does not identify a known action.
///
/// # Examples
///
/// ```
/// use http::Method;
/// use s3gate_classify::{classify, ClassifyError, Permission, RequestDescriptor};
///
/// let req = RequestDescriptor::decompose(Method::POST, "/bucket/", Some("delete"));
/// let action = classify(&req).unwrap();
/// assert_eq!(action.name(), "DeleteObjects");
/// assert_eq!(action.permission(), Permission::DELETE_OBJECT);
///
/// let req = RequestDescriptor::decompose(Method::PUT, "/", None);
/// assert!(matches!(classify(&req), Err(ClassifyError::UnsupportedGlobalMethod(_))));
/// ```
pub fn classify(req: &RequestDescriptor) -> Result<Action, ClassifyError> {
    let method = req.method();
    let query = req.query();

    let result = match req.scope() {
        Scope::Global => classify_global(method),
        Scope::Bucket => classify_bucket(method, query),
        Scope::Object => classify_object(method, query),
    };

    debug!(
        method = %method,
        bucket = req.bucket(),
        key = req.key(),
        result = ?result,
        "classified request"
    );

    result
}

fn classify_global(method: &Method) -> Result<Action, ClassifyError> {
    match *method {
        Method::GET => Ok(Action::new("ListBuckets", Permission::LIST_ALL_MY_BUCKETS)),
        _ => Err(ClassifyError::UnsupportedGlobalMethod(method.clone())),
    }
}

fn classify_bucket(method: &Method, query: &QueryParams) -> Result<Action, ClassifyError> {
    match *method {
        Method::GET => Ok(classify_bucket_get(query)),
        Method::POST if query.has("delete") => {
            Ok(Action::new("DeleteObjects", Permission::DELETE_OBJECT))
        }
        // Sub-resource writes (`PUT ?policy`, `PUT ?acl`, ...) are not distinguished.
        Method::PUT => Ok(Action::new("CreateBucket", Permission::CREATE_BUCKET)),
        Method::DELETE => Ok(classify_bucket_delete(query)),
        _ => Err(ClassifyError::UnknownBucketLevelAction(method.clone())),
    }
}

/// Identify a GET on a bucket.
fn classify_bucket_get(query: &QueryParams) -> Action {
    if let Some(sub) = LISTABLE_BUCKET_SUBRESOURCES.find(query) {
        return if query.non_empty("id").is_some() {
            Action::composed("Get", sub.operation, "", Permission::Unsupported)
        } else {
            Action::composed("List", sub.operation, "s", Permission::Unsupported)
        };
    }
    if let Some(sub) = BUCKET_SUBRESOURCES.find(query) {
        return Action::composed("Get", sub.operation, "", Permission::Unsupported);
    }
    if query.has("versions") {
        return Action::new("ListObjectVersions", Permission::LIST_BUCKET_VERSIONS);
    }
    if query.first("list-type") == Some("2") {
        return Action::new("ListObjectsV2", Permission::LIST_BUCKET);
    }

    Action::new("ListObjects", Permission::LIST_BUCKET)
}

/// Identify a DELETE on a bucket.
fn classify_bucket_delete(query: &QueryParams) -> Action {
    // `lifecycle` maps to DeleteBucketLifecycle, not DeleteBucketLifecycleConfiguration.
    if query.has("lifecycle") {
        return Action::new("DeleteBucketLifecycle", Permission::Unsupported);
    }
    if query.non_empty("id").is_some() {
        if let Some(sub) = LISTABLE_BUCKET_SUBRESOURCES.find(query) {
            return Action::composed("Delete", sub.operation, "", Permission::Unsupported);
        }
    }
    if let Some(sub) = BUCKET_SUBRESOURCES.find(query) {
        return Action::composed("Delete", sub.operation, "", Permission::Unsupported);
    }

    Action::new("DeleteBucket", Permission::DELETE_BUCKET)
}

fn classify_object(method: &Method, query: &QueryParams) -> Result<Action, ClassifyError> {
    match *method {
        Method::POST => {
            if query.non_empty("uploadId").is_some() {
                return Ok(Action::new(
                    "CompleteMultipartUpload",
                    Permission::Unsupported,
                ));
            }
            if query.has("uploads") {
                return Ok(Action::new("CreateMultipartUpload", Permission::PUT_OBJECT));
            }
            Err(ClassifyError::UnknownObjectLevelAction(method.clone()))
        }
        Method::DELETE => {
            if let Some(sub) = OBJECT_SUBRESOURCES.find(query) {
                return Ok(Action::composed(
                    "Delete",
                    sub.operation,
                    "",
                    Permission::Unsupported,
                ));
            }
            if query.non_empty("uploadId").is_some() {
                return Ok(Action::new("AbortMultipartUpload", Permission::Unsupported));
            }
            Ok(Action::new("DeleteObject", Permission::DELETE_OBJECT))
        }
        // GET, PUT, HEAD and the rest have no mapping yet.
        _ => Err(ClassifyError::UnknownObjectLevelAction(method.clone())),
    }
}
