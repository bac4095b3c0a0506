//! Static sub-resource lookup tables.
//!
//! Each table maps a query-parameter flag to the operation fragment used to build the
//! action name (`Get` + `BucketCors`). Tables are ordered slices, not maps: when a
//! request carries several flags from the same table, the entry declared first wins.

use crate::request::QueryParams;

/// A query-parameter flag and the operation it addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubResource {
    /// Query-parameter name, e.g. `cors`.
    pub param: &'static str,
    /// Operation fragment, e.g. `BucketCors`.
    pub operation: &'static str,
}

impl SubResource {
    const fn new(param: &'static str, operation: &'static str) -> Self {
        Self { param, operation }
    }
}

/// An ordered, immutable sub-resource table.
#[derive(Debug, Clone, Copy)]
pub struct SubResourceTable {
    name: &'static str,
    entries: &'static [SubResource],
}

impl SubResourceTable {
    const fn new(name: &'static str, entries: &'static [SubResource]) -> Self {
        Self { name, entries }
    }

    /// The table's name, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Entries in priority order.
    #[must_use]
    pub fn entries(&self) -> &'static [SubResource] {
        self.entries
    }

    /// The first entry, in declaration order, whose parameter is present in `query`.
    ///
    /// The order of parameters in the request never affects the result.
    #[must_use]
    pub fn find(&self, query: &QueryParams) -> Option<&'static SubResource> {
        self.entries.iter().find(|entry| query.has(entry.param))
    }
}

/// Bucket sub-resources that are listed without an `id` and addressed individually with one.
pub static LISTABLE_BUCKET_SUBRESOURCES: SubResourceTable = SubResourceTable::new(
    "listable-bucket",
    &[
        SubResource::new("analytics", "BucketAnalyticsConfiguration"),
        SubResource::new("intelligent-tiering", "BucketIntelligentTieringConfiguration"),
        SubResource::new("inventory", "BucketInventoryConfiguration"),
        SubResource::new("metrics", "BucketMetricsConfiguration"),
        SubResource::new("uploads", "MultipartUpload"),
    ],
);

/// Bucket configuration sub-resources.
pub static BUCKET_SUBRESOURCES: SubResourceTable = SubResourceTable::new(
    "bucket",
    &[
        SubResource::new("accelerate", "BucketAccelerateConfiguration"),
        SubResource::new("acl", "BucketAcl"),
        SubResource::new("cors", "BucketCors"),
        SubResource::new("encryption", "BucketEncryption"),
        SubResource::new("lifecycle", "BucketLifecycleConfiguration"),
        SubResource::new("location", "BucketLocation"),
        SubResource::new("logging", "BucketLogging"),
        SubResource::new("notification", "BucketNotificationConfiguration"),
        SubResource::new("ownershipControls", "BucketOwnershipControls"),
        SubResource::new("policy", "BucketPolicy"),
        SubResource::new("policyStatus", "BucketPolicyStatus"),
        SubResource::new("publicAccessBlock", "PublicAccessBlock"),
        SubResource::new("replication", "BucketReplication"),
        SubResource::new("requestPayment", "BucketRequestPayment"),
        SubResource::new("tagging", "BucketTagging"),
        SubResource::new("website", "BucketWebsite"),
        // Listable configurations addressed without an id fall through to here on DELETE.
        SubResource::new("analytics", "BucketAnalyticsConfiguration"),
        SubResource::new("intelligent-tiering", "BucketIntelligentTieringConfiguration"),
        SubResource::new("inventory", "BucketInventoryConfiguration"),
        SubResource::new("metrics", "BucketMetricsConfiguration"),
    ],
);

/// Object sub-resources.
pub static OBJECT_SUBRESOURCES: SubResourceTable =
    SubResourceTable::new("object", &[SubResource::new("tagging", "ObjectTagging")]);

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_should_have_unique_params_per_table() {
        for table in [
            &LISTABLE_BUCKET_SUBRESOURCES,
            &BUCKET_SUBRESOURCES,
            &OBJECT_SUBRESOURCES,
        ] {
            let params: HashSet<_> = table.entries().iter().map(|e| e.param).collect();
            assert_eq!(params.len(), table.entries().len(), "table {}", table.name());
        }
    }

    #[test]
    fn test_should_pick_first_declared_entry() {
        let q = QueryParams::parse("website&cors&acl");
        assert_eq!(BUCKET_SUBRESOURCES.find(&q).map(|e| e.param), Some("acl"));
    }

    #[test]
    fn test_should_return_none_without_flags() {
        let q = QueryParams::parse("prefix=a&delimiter=/");
        assert!(BUCKET_SUBRESOURCES.find(&q).is_none());
        assert!(LISTABLE_BUCKET_SUBRESOURCES.find(&q).is_none());
        assert!(OBJECT_SUBRESOURCES.find(&q).is_none());
    }
}
