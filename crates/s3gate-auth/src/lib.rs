//! Caller identity and backend credentials for the s3gate authorizing proxy.
//!
//! The gateway sits between S3 clients and an S3-compatible backend, so it deals with
//! signatures in both directions:
//!
//! - **Inbound**: [`IdentityResolver`] extracts the caller's access key from a SigV4
//!   `Authorization` header or a presigned URL and, when configured, verifies the
//!   signature against a client credential store.
//! - **Outbound**: a [`CredentialAttacher`] strips client-hop state from the request and,
//!   for [`SigV4Attacher`], re-signs it with the gateway's own backend credentials.
//!
//! # Modules
//!
//! - [`canonical`] - SigV4 canonical request construction
//! - [`sigv4`] - Authorization header parsing, signing, and verification
//! - [`presigned`] - Presigned URL verification
//! - [`credentials`] - Client and backend credential stores
//! - [`identity`] - Caller identity resolution
//! - [`attach`] - Outgoing request preparation and re-signing
//! - [`error`] - Error types

pub mod attach;
pub mod canonical;
pub mod credentials;
pub mod error;
pub mod identity;
pub mod presigned;
pub mod sigv4;

pub use attach::{CredentialAttacher, PassthroughAttacher, SigV4Attacher};
pub use credentials::{
    BackendCredentialProvider, BackendCredentials, CredentialProvider, StaticBackendCredentials,
    StaticCredentialProvider,
};
pub use error::AuthError;
pub use identity::{ANONYMOUS, AuthMethod, Identity, IdentityResolver};
