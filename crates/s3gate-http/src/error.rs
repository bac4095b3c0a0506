//! Gateway error codes and their mapping from pipeline failures.

use std::fmt;

use http::StatusCode;

use s3gate_auth::AuthError;
use s3gate_authz::DenyReason;
use s3gate_classify::ClassifyError;

use crate::forward::ForwardError;

/// S3-style error codes the gateway itself produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayErrorCode {
    /// Authorization denied, for any reason.
    AccessDenied,
    /// The method is not valid at the addressed scope.
    MethodNotAllowed,
    /// The request could not be classified or prepared for the backend.
    InvalidRequest,
    /// The client signature did not verify.
    SignatureDoesNotMatch,
    /// The client access key is unknown.
    InvalidAccessKeyId,
    /// The backend could not be reached.
    BadGateway,
    /// The deadline passed before the backend answered.
    GatewayTimeout,
    /// An unexpected gateway failure.
    InternalError,
}

impl GatewayErrorCode {
    /// The code as it appears in the `<Code>` element.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::InvalidRequest => "InvalidRequest",
            Self::SignatureDoesNotMatch => "SignatureDoesNotMatch",
            Self::InvalidAccessKeyId => "InvalidAccessKeyId",
            Self::BadGateway => "BadGateway",
            Self::GatewayTimeout => "GatewayTimeout",
            Self::InternalError => "InternalError",
        }
    }

    /// The HTTP status normally returned with this code.
    #[must_use]
    pub fn default_status_code(&self) -> StatusCode {
        match self {
            Self::AccessDenied | Self::SignatureDoesNotMatch | Self::InvalidAccessKeyId => {
                StatusCode::FORBIDDEN
            }
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::BadGateway => StatusCode::BAD_GATEWAY,
            Self::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message used when no specific one is given.
    #[must_use]
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::AccessDenied => "Access Denied",
            Self::MethodNotAllowed => "The specified method is not allowed against this resource.",
            Self::InvalidRequest => "Invalid Request",
            Self::SignatureDoesNotMatch => {
                "The request signature we calculated does not match the signature you provided."
            }
            Self::InvalidAccessKeyId => {
                "The AWS access key Id you provided does not exist in our records."
            }
            Self::BadGateway => "The backend could not be reached.",
            Self::GatewayTimeout => "The backend did not respond in time.",
            Self::InternalError => "We encountered an internal error. Please try again.",
        }
    }
}

impl fmt::Display for GatewayErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error rendered to the client as an S3 `<Error>` document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayError {
    /// The error code.
    pub code: GatewayErrorCode,
    /// Human-readable message.
    pub message: String,
    /// The request path the error concerns, when known.
    pub resource: Option<String>,
}

impl GatewayError {
    /// An error with the code's default message.
    #[must_use]
    pub fn new(code: GatewayErrorCode) -> Self {
        Self::with_message(code, code.default_message())
    }

    /// An error with a custom message.
    #[must_use]
    pub fn with_message(code: GatewayErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            resource: None,
        }
    }

    /// Attach the request path.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// The HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.code.default_status_code()
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for GatewayError {}

impl From<&ClassifyError> for GatewayError {
    fn from(err: &ClassifyError) -> Self {
        let code = match err {
            ClassifyError::UnsupportedGlobalMethod(_) => GatewayErrorCode::MethodNotAllowed,
            ClassifyError::UnknownBucketLevelAction(_)
            | ClassifyError::UnknownObjectLevelAction(_) => GatewayErrorCode::InvalidRequest,
        };
        Self::with_message(code, err.to_string())
    }
}

impl From<&DenyReason> for GatewayError {
    fn from(reason: &DenyReason) -> Self {
        match reason {
            DenyReason::Classification(err) => err.into(),
            DenyReason::UnsupportedPermission { .. } => {
                Self::with_message(GatewayErrorCode::AccessDenied, reason.to_string())
            }
            DenyReason::PolicyDenied { reason: Some(r) } => {
                Self::with_message(GatewayErrorCode::AccessDenied, r.clone())
            }
            // Evaluator internals stay in the logs.
            DenyReason::PolicyDenied { reason: None }
            | DenyReason::EvaluatorFailed(_)
            | DenyReason::Timeout => Self::new(GatewayErrorCode::AccessDenied),
        }
    }
}

impl From<&AuthError> for GatewayError {
    fn from(err: &AuthError) -> Self {
        let code = match err {
            AuthError::SignatureDoesNotMatch => GatewayErrorCode::SignatureDoesNotMatch,
            AuthError::AccessKeyNotFound(_) => GatewayErrorCode::InvalidAccessKeyId,
            e if e.is_authentication_failure() => GatewayErrorCode::AccessDenied,
            _ => GatewayErrorCode::InvalidRequest,
        };
        match code {
            GatewayErrorCode::SignatureDoesNotMatch | GatewayErrorCode::InvalidAccessKeyId => {
                Self::new(code)
            }
            _ => Self::with_message(code, err.to_string()),
        }
    }
}

impl From<&ForwardError> for GatewayError {
    fn from(err: &ForwardError) -> Self {
        match err {
            ForwardError::Timeout => Self::new(GatewayErrorCode::GatewayTimeout),
            ForwardError::Connect(_) | ForwardError::Transport(_) => {
                Self::new(GatewayErrorCode::BadGateway)
            }
            ForwardError::InvalidTarget(msg) => {
                Self::with_message(GatewayErrorCode::InternalError, msg.clone())
            }
        }
    }
}
