//! In-process evaluators: a static rule list and deny-all.
//!
//! A rules document is an ordered list:
//!
//! ```json
//! {"rules": [
//!   {"effect": "Allow", "principals": ["AKIAREADER"], "permissions": ["s3:ListBucket"],
//!    "resources": ["logs", "logs/*"]},
//!   {"effect": "Deny", "principals": ["*"], "permissions": ["s3:DeleteBucket"],
//!    "resources": ["*"]}
//! ]}
//! ```
//!
//! Patterns are exact, `*`, or a prefix ending in `*`. Resource patterns may carry the
//! `arn:aws:s3:::` prefix. Any matching deny wins; otherwise any matching allow allows;
//! otherwise the request is denied.
//!
//! An allow rule only grants a named principal to callers whose signature was verified,
//! so a claimed access key cannot borrow another caller's rights. `*` and `anonymous`
//! are unaffected. Set `"requireVerified": false` on a rule to trust claimed keys.

use std::path::Path;

use async_trait::async_trait;
use s3gate_auth::ANONYMOUS;
use serde::Deserialize;
use tracing::info;

use crate::evaluator::{EvaluatorError, PolicyEvaluator, PolicyRequest, PolicyVerdict};

const ARN_PREFIX: &str = "arn:aws:s3:::";

/// Failure to load a rules document.
#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    /// The file could not be read.
    #[error("failed to read policy rules from {path}: {source}")]
    Io {
        /// The file path.
        path: String,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The document is not valid.
    #[error("invalid policy rules: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Whether a matching rule grants or refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Effect {
    /// Grant.
    Allow,
    /// Refuse; wins over any allow.
    Deny,
}

/// One rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    /// Allow or deny.
    pub effect: Effect,
    /// Principal patterns (access key IDs, `anonymous`, `*`).
    pub principals: Vec<String>,
    /// Permission patterns such as `s3:ListBucket` or `s3:*`.
    pub permissions: Vec<String>,
    /// Resource patterns such as `bucket`, `bucket/*`, or `*`.
    pub resources: Vec<String>,
    /// Optional label, reported as the verdict reason.
    #[serde(default)]
    pub id: Option<String>,
    /// Whether an allow needs a verified signature to grant a named principal.
    #[serde(rename = "requireVerified", default = "default_require_verified")]
    pub require_verified: bool,
}

fn default_require_verified() -> bool {
    true
}

impl Rule {
    fn matches(&self, request: &PolicyRequest) -> bool {
        self.principals
            .iter()
            .any(|p| self.principal_matches(p, request))
            && self
                .permissions
                .iter()
                .any(|p| pattern_matches(p, &request.permission))
            && self.resources.iter().any(|p| {
                let p = p.strip_prefix(ARN_PREFIX).unwrap_or(p);
                pattern_matches(p, &request.resource)
            })
    }

    fn principal_matches(&self, pattern: &str, request: &PolicyRequest) -> bool {
        if pattern == "*" {
            return true;
        }
        if !pattern_matches(pattern, &request.principal) {
            return false;
        }
        // Denies apply to whoever the caller claims to be.
        self.effect == Effect::Deny
            || !self.require_verified
            || request.verified
            || request.principal == ANONYMOUS
    }

    fn label(&self) -> String {
        self.id.clone().unwrap_or_else(|| {
            match self.effect {
                Effect::Allow => "allowed by rule",
                Effect::Deny => "denied by rule",
            }
            .to_owned()
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RulesDocument {
    Wrapped { rules: Vec<Rule> },
    Bare(Vec<Rule>),
}

/// Evaluates requests against an ordered in-memory rule list.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicyEvaluator {
    rules: Vec<Rule>,
}

impl StaticPolicyEvaluator {
    /// An evaluator over `rules`.
    #[must_use]
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Parse a rules document: either `{"rules": [...]}` or a bare array.
    pub fn from_json(json: &str) -> Result<Self, RulesError> {
        let rules = match serde_json::from_str(json)? {
            RulesDocument::Wrapped { rules } | RulesDocument::Bare(rules) => rules,
        };
        Ok(Self::new(rules))
    }

    /// Read and parse a rules file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RulesError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| RulesError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let evaluator = Self::from_json(&json)?;
        info!(path = %path.display(), rules = evaluator.rules.len(), "loaded policy rules");
        Ok(evaluator)
    }

    /// The rules, in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Evaluate synchronously.
    #[must_use]
    pub fn decide(&self, request: &PolicyRequest) -> PolicyVerdict {
        let mut allowed_by = None;
        for rule in self.rules.iter().filter(|r| r.matches(request)) {
            match rule.effect {
                Effect::Deny => return PolicyVerdict::deny(rule.label()),
                Effect::Allow => {
                    allowed_by.get_or_insert(rule);
                }
            }
        }
        match allowed_by {
            Some(rule) => PolicyVerdict {
                allow: true,
                reason: Some(rule.label()),
            },
            None => PolicyVerdict::deny("no matching rule"),
        }
    }
}

#[async_trait]
impl PolicyEvaluator for StaticPolicyEvaluator {
    async fn evaluate(&self, request: &PolicyRequest) -> Result<PolicyVerdict, EvaluatorError> {
        Ok(self.decide(request))
    }
}

/// Denies every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAllEvaluator;

#[async_trait]
impl PolicyEvaluator for DenyAllEvaluator {
    async fn evaluate(&self, _request: &PolicyRequest) -> Result<PolicyVerdict, EvaluatorError> {
        Ok(PolicyVerdict::deny("no policy evaluator configured"))
    }
}

fn pattern_matches(pattern: &str, value: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => pattern == value,
    }
}
