//! Authorization decisions.

use std::fmt;

use s3gate_classify::ClassifyError;

/// Why a request was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// The request could not be classified; the evaluator was not consulted.
    Classification(ClassifyError),
    /// The action is known but has no permission mapping yet.
    UnsupportedPermission {
        /// The canonical action name.
        action: String,
    },
    /// The policy evaluator denied the request.
    PolicyDenied {
        /// The evaluator's explanation, if any.
        reason: Option<String>,
    },
    /// The policy evaluator failed.
    EvaluatorFailed(String),
    /// The policy evaluator did not answer within the deadline.
    Timeout,
}

impl DenyReason {
    /// A short stable identifier for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Classification(err) => err.kind(),
            Self::UnsupportedPermission { .. } => "UnsupportedPermission",
            Self::PolicyDenied { .. } => "PolicyDenied",
            Self::EvaluatorFailed(_) => "EvaluatorFailed",
            Self::Timeout => "EvaluatorTimeout",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classification(err) => write!(f, "{err}"),
            Self::UnsupportedPermission { action } => {
                write!(f, "no permission mapping for action {action}")
            }
            Self::PolicyDenied { reason: Some(reason) } => write!(f, "denied by policy: {reason}"),
            Self::PolicyDenied { reason: None } => f.write_str("denied by policy"),
            Self::EvaluatorFailed(err) => write!(f, "policy evaluation failed: {err}"),
            Self::Timeout => f.write_str("policy evaluation timed out"),
        }
    }
}

/// The gate's verdict for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Forward the request.
    Allow {
        /// The evaluator's explanation, if any.
        reason: Option<String>,
    },
    /// Reject the request before it reaches the backend.
    Deny(DenyReason),
}

impl Decision {
    /// Whether the request may be forwarded.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    /// The deny reason, if denied.
    #[must_use]
    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Self::Allow { .. } => None,
            Self::Deny(reason) => Some(reason),
        }
    }
}
