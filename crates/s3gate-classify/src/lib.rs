//! S3 request classification for the s3gate authorizing proxy.
//!
//! This crate turns an inbound HTTP request into the canonical S3 action it performs and
//! the permission a caller needs to perform it. It is pure: no I/O and no shared mutable
//! state beyond the immutable sub-resource tables in [`table`].
//!
//! - **Decomposition** ([`request`]): splits the request target into bucket, key, and a
//!   multi-valued query parameter set, and derives the request [`Scope`].
//! - **Tables** ([`table`]): ordered sub-resource lookup tables. The declaration order of
//!   each table is its tie-break priority.
//! - **Classification** ([`classifier`]): the scope × method × query state machine.
//!
//! # Usage
//!
//! ```rust
//! use http::Method;
//! use s3gate_classify::{Permission, RequestDescriptor, classify};
//!
//! let req = RequestDescriptor::decompose(Method::GET, "/", None);
//! let action = classify(&req).expect("ListBuckets is classified");
//! assert_eq!(action.name(), "ListBuckets");
//! assert_eq!(action.permission(), Permission::LIST_ALL_MY_BUCKETS);
//! ```

pub mod action;
pub mod classifier;
pub mod error;
pub mod request;
pub mod table;

pub use action::{Action, Permission};
pub use classifier::classify;
pub use error::ClassifyError;
pub use request::{QueryParams, RequestDescriptor, Scope};
