//! Authorization for the s3gate proxy.
//!
//! [`AuthorizationGate`] combines a classification result, the caller [`Identity`](s3gate_auth::Identity),
//! and a [`PolicyEvaluator`] into a fail-closed [`Decision`]. Three evaluators are
//! provided: [`HttpPolicyEvaluator`] for a remote OPA-style decision service,
//! [`StaticPolicyEvaluator`] for a local rules file, and [`DenyAllEvaluator`].

pub mod decision;
pub mod evaluator;
pub mod gate;
pub mod http;
pub mod static_rules;

pub use decision::{Decision, DenyReason};
pub use evaluator::{EvaluatorError, PolicyEvaluator, PolicyRequest, PolicyVerdict};
pub use gate::AuthorizationGate;
pub use http::{HttpPolicyConfig, HttpPolicyEvaluator};
pub use static_rules::{DenyAllEvaluator, Effect, Rule, RulesError, StaticPolicyEvaluator};
