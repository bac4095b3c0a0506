//! Assembly of the gateway pipeline from [`GatewayConfig`].

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use s3gate_auth::{
    CredentialAttacher, IdentityResolver, PassthroughAttacher, SigV4Attacher,
    StaticBackendCredentials, StaticCredentialProvider,
};
use s3gate_authz::{
    AuthorizationGate, DenyAllEvaluator, HttpPolicyConfig, HttpPolicyEvaluator, PolicyEvaluator,
    StaticPolicyEvaluator,
};
use s3gate_core::GatewayConfig;
use s3gate_http::{BackendTarget, Forwarder, ForwarderTimeouts, GatewayHttpConfig, GatewayService};

/// Build the caller identity resolver.
///
/// Signatures are verified unless `SKIP_SIGNATURE_VALIDATION` is set. With an empty
/// client credential store every signed request fails verification and only anonymous
/// callers reach the policy evaluator.
pub fn build_identity_resolver(config: &GatewayConfig) -> IdentityResolver {
    if config.skip_signature_validation {
        warn!("signature validation disabled; client access keys are trusted as claimed");
        return IdentityResolver::unverified();
    }

    let store = StaticCredentialProvider::new(
        config
            .client_credentials
            .iter()
            .map(|c| (c.access_key_id.clone(), c.secret_access_key.clone())),
    );
    if store.is_empty() {
        warn!("CLIENT_CREDENTIALS is empty; signed requests will be rejected");
    } else {
        info!(keys = store.len(), "verifying client signatures");
    }
    IdentityResolver::verifying(Arc::new(store))
}

/// Pick the policy evaluator: HTTP endpoint, then rules file, then deny-all.
pub fn build_evaluator(config: &GatewayConfig) -> Result<Arc<dyn PolicyEvaluator>> {
    if let Some(endpoint) = &config.policy_endpoint {
        let evaluator = HttpPolicyEvaluator::new(HttpPolicyConfig {
            endpoint: endpoint.clone(),
            auth_token: config.policy_auth_token.clone(),
            timeout: config.policy_timeout(),
            connect_timeout: config.connect_timeout().min(config.policy_timeout()),
            pool_idle_timeout: config.pool_idle_timeout(),
        })
        .context("failed to build policy evaluator client")?;
        info!(endpoint = %endpoint, "using HTTP policy evaluator");
        return Ok(Arc::new(evaluator));
    }

    if let Some(path) = &config.policy_rules_file {
        let evaluator = StaticPolicyEvaluator::from_file(path)
            .with_context(|| format!("failed to load policy rules from {path}"))?;
        return Ok(Arc::new(evaluator));
    }

    warn!("no POLICY_ENDPOINT or POLICY_RULES_FILE configured, denying all requests");
    Ok(Arc::new(DenyAllEvaluator))
}

/// Re-sign for the backend when backend keys are configured, otherwise pass through.
#[must_use]
pub fn build_attacher(config: &GatewayConfig) -> Arc<dyn CredentialAttacher> {
    match (
        &config.backend_access_key_id,
        &config.backend_secret_access_key,
    ) {
        (Some(access_key_id), Some(secret_access_key)) => {
            info!(access_key_id = %access_key_id, region = %config.backend_region, "re-signing backend requests");
            Arc::new(SigV4Attacher::new(
                Arc::new(StaticBackendCredentials::new(
                    access_key_id.clone(),
                    secret_access_key.clone(),
                    config.backend_session_token.clone(),
                )),
                config.backend_region.clone(),
            ))
        }
        _ => Arc::new(PassthroughAttacher),
    }
}

/// Build the backend forwarder.
pub fn build_forwarder(config: &GatewayConfig) -> Result<Forwarder> {
    let target = BackendTarget::parse(&config.backend_endpoint)
        .with_context(|| format!("invalid BACKEND_ENDPOINT: {}", config.backend_endpoint))?;
    Ok(Forwarder::new(
        target,
        ForwarderTimeouts {
            connect: config.connect_timeout(),
            pool_idle: config.pool_idle_timeout(),
            response_header: config.response_header_timeout(),
        },
    ))
}

/// Build the whole service.
pub fn build_service(config: &GatewayConfig) -> Result<GatewayService> {
    Ok(GatewayService::new(GatewayHttpConfig {
        identity: build_identity_resolver(config),
        gate: AuthorizationGate::new(build_evaluator(config)?, config.policy_timeout()),
        attacher: build_attacher(config),
        forwarder: build_forwarder(config)?,
        request_timeout: config.request_timeout(),
    }))
}
