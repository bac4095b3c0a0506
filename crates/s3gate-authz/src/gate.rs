//! The authorization gate.
//!
//! The gate is fail-closed: every path that does not end in an explicit allow from the
//! evaluator is a deny. Classification errors and unmapped permissions are decided
//! locally without an evaluator call; evaluator errors and timeouts deny. Nothing is
//! retried.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use s3gate_auth::Identity;
use s3gate_classify::{Action, ClassifyError, RequestDescriptor};
use s3gate_core::Deadline;

use crate::decision::{Decision, DenyReason};
use crate::evaluator::{PolicyEvaluator, PolicyRequest};

/// Turns a classified request and its caller into an allow/deny [`Decision`].
#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    evaluator: Arc<dyn PolicyEvaluator>,
    evaluation_timeout: Duration,
}

impl AuthorizationGate {
    /// A gate consulting `evaluator`, each call bounded by `evaluation_timeout` and by
    /// the request deadline, whichever is sooner.
    #[must_use]
    pub fn new(evaluator: Arc<dyn PolicyEvaluator>, evaluation_timeout: Duration) -> Self {
        Self {
            evaluator,
            evaluation_timeout,
        }
    }

    /// Decide whether a request may be forwarded.
    pub async fn authorize(
        &self,
        classified: &Result<Action, ClassifyError>,
        identity: &Identity,
        request: &RequestDescriptor,
        deadline: Deadline,
    ) -> Decision {
        let action = match classified {
            Ok(action) => action,
            Err(err) => {
                return deny(identity, request, None, DenyReason::Classification(err.clone()));
            }
        };

        if action.permission().is_unsupported() {
            let reason = DenyReason::UnsupportedPermission {
                action: action.name().to_owned(),
            };
            return deny(identity, request, Some(action), reason);
        }

        let input = PolicyRequest::new(identity, action, request);
        let bound = deadline.tighten(self.evaluation_timeout);
        match bound.run("evaluating policy", self.evaluator.evaluate(&input)).await {
            Ok(Ok(verdict)) if verdict.allow => {
                debug!(
                    identity = %identity,
                    action = %action.name(),
                    permission = %action.permission(),
                    resource = %input.resource,
                    "request allowed"
                );
                Decision::Allow {
                    reason: verdict.reason,
                }
            }
            Ok(Ok(verdict)) => deny(
                identity,
                request,
                Some(action),
                DenyReason::PolicyDenied {
                    reason: verdict.reason,
                },
            ),
            Ok(Err(err)) => deny(
                identity,
                request,
                Some(action),
                DenyReason::EvaluatorFailed(err.to_string()),
            ),
            Err(_) => deny(identity, request, Some(action), DenyReason::Timeout),
        }
    }
}

fn deny(
    identity: &Identity,
    request: &RequestDescriptor,
    action: Option<&Action>,
    reason: DenyReason,
) -> Decision {
    warn!(
        identity = %identity,
        method = %request.method(),
        bucket = request.bucket(),
        key = request.key(),
        action = action.map(Action::name),
        permission = action.map(|a| a.permission().as_str()),
        kind = reason.kind(),
        reason = %reason,
        "request denied"
    );
    Decision::Deny(reason)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use http::Method;
    use s3gate_classify::classify;

    use super::*;
    use crate::evaluator::{EvaluatorError, PolicyVerdict};

    #[derive(Debug)]
    enum Behavior {
        Allow,
        Deny,
        Fail,
        Hang,
    }

    #[derive(Debug)]
    struct MockEvaluator {
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl MockEvaluator {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PolicyEvaluator for MockEvaluator {
        async fn evaluate(&self, request: &PolicyRequest) -> Result<PolicyVerdict, EvaluatorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Allow => Ok(PolicyVerdict::allow()),
                Behavior::Deny => Ok(PolicyVerdict::deny(format!("{} may not", request.principal))),
                Behavior::Fail => Err(EvaluatorError::Status(500)),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(PolicyVerdict::allow())
                }
            }
        }
    }

    fn gate(evaluator: &Arc<MockEvaluator>) -> AuthorizationGate {
        AuthorizationGate::new(evaluator.clone(), Duration::from_secs(5))
    }

    async fn decide(gate: &AuthorizationGate, method: Method, path: &str, query: Option<&str>) -> Decision {
        let request = RequestDescriptor::decompose(method, path, query);
        let classified = classify(&request);
        let identity = Identity::access_key("alice", s3gate_auth::AuthMethod::Header, false);
        gate.authorize(
            &classified,
            &identity,
            &request,
            Deadline::after(Duration::from_secs(60)),
        )
        .await
    }

    #[tokio::test]
    async fn test_should_allow_when_evaluator_allows() {
        let evaluator = MockEvaluator::new(Behavior::Allow);
        let decision = decide(&gate(&evaluator), Method::GET, "/", None).await;
        assert!(decision.is_allowed());
        assert_eq!(evaluator.calls(), 1);
    }

    #[tokio::test]
    async fn test_should_propagate_policy_denial_reason() {
        let evaluator = MockEvaluator::new(Behavior::Deny);
        let decision = decide(&gate(&evaluator), Method::DELETE, "/bucket", None).await;
        assert_eq!(
            decision,
            Decision::Deny(DenyReason::PolicyDenied {
                reason: Some("alice may not".to_owned())
            })
        );
    }

    #[tokio::test]
    async fn test_should_deny_unsupported_without_calling_evaluator() {
        let evaluator = MockEvaluator::new(Behavior::Allow);
        let decision = decide(&gate(&evaluator), Method::GET, "/bucket/", Some("cors")).await;
        assert_eq!(
            decision,
            Decision::Deny(DenyReason::UnsupportedPermission {
                action: "GetBucketCors".to_owned()
            })
        );
        assert_eq!(evaluator.calls(), 0);
    }

    #[tokio::test]
    async fn test_should_deny_classification_errors_without_calling_evaluator() {
        let evaluator = MockEvaluator::new(Behavior::Allow);
        let decision = decide(&gate(&evaluator), Method::GET, "/bucket/my/test/key", None).await;
        assert_eq!(
            decision,
            Decision::Deny(DenyReason::Classification(
                ClassifyError::UnknownObjectLevelAction(Method::GET)
            ))
        );
        assert_eq!(evaluator.calls(), 0);
    }

    #[tokio::test]
    async fn test_should_deny_when_evaluator_fails() {
        let evaluator = MockEvaluator::new(Behavior::Fail);
        let decision = decide(&gate(&evaluator), Method::GET, "/bucket", None).await;
        assert!(matches!(
            decision,
            Decision::Deny(DenyReason::EvaluatorFailed(_))
        ));
        assert_eq!(evaluator.calls(), 1, "failures are not retried");
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_deny_when_evaluator_times_out() {
        let evaluator = MockEvaluator::new(Behavior::Hang);
        let gate = AuthorizationGate::new(evaluator.clone(), Duration::from_millis(50));
        let decision = decide(&gate, Method::GET, "/bucket", None).await;
        assert_eq!(decision, Decision::Deny(DenyReason::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_respect_request_deadline_shorter_than_evaluation_timeout() {
        let evaluator = MockEvaluator::new(Behavior::Hang);
        let gate = gate(&evaluator);
        let request = RequestDescriptor::decompose(Method::GET, "/bucket", None);
        let decision = gate
            .authorize(
                &classify(&request),
                &Identity::anonymous(),
                &request,
                Deadline::after(Duration::from_millis(10)),
            )
            .await;
        assert_eq!(decision, Decision::Deny(DenyReason::Timeout));
    }
}
