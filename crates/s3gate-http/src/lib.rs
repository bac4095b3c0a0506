//! HTTP layer of the s3gate authorizing proxy.
//!
//! [`GatewayService`] is a hyper service: it resolves the caller, classifies the
//! request, asks the [`AuthorizationGate`](s3gate_authz::AuthorizationGate), and relays
//! allowed requests to the backend through a [`Forwarder`]. Denied and failed requests
//! are answered locally with S3-style XML errors.

pub mod body;
pub mod error;
pub mod forward;
pub mod response;
pub mod service;
pub mod target;

pub use body::GatewayBody;
pub use error::{GatewayError, GatewayErrorCode};
pub use forward::{ForwardError, Forwarder, ForwarderTimeouts, IdentityTransform, ResponseTransform};
pub use response::error_to_response;
pub use service::{GatewayHttpConfig, GatewayService, SERVER_NAME};
pub use target::BackendTarget;
