//! Core building blocks shared by every s3gate crate.
//!
//! This crate holds the process-wide [`GatewayConfig`], the per-request [`Deadline`]
//! that bounds every suspension point of the proxy pipeline, and the core error type.

mod config;
mod deadline;
mod error;

pub use config::{ClientCredential, GatewayConfig};
pub use deadline::Deadline;
pub use error::{CoreError, CoreResult};
