//! Per-navigation route gating.
//!
//! Decision order for a requested path:
//! 1. excluded paths (API, static assets) pass untouched;
//! 2. a public path with a credential present goes to the landing page, the
//!    credential is not verified for this;
//! 3. a protected path without a credential goes to login with the path as
//!    resume target;
//! 4. a protected path with a credential is verified under a timeout. Only a
//!    positive answer allows; invalid, revoked, timed out and unreachable all
//!    redirect to login and drop the credential, otherwise step 2 would bounce
//!    the login page straight back to the landing page.

pub mod policy;
pub mod verifier;

pub use policy::{PathClass, RESUME_PARAM, RoutePolicy};
pub use verifier::{
    HttpSessionVerifier, SessionVerifier, StoreVerifier, VerifiedSession, VerifyError,
};

use std::{sync::Arc, time::Duration};
use tracing::{debug, error, instrument};

pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect(String),
    /// Redirect and clear the credential that failed verification.
    Reject(String),
}

#[derive(Clone)]
pub struct RouteGate {
    policy: RoutePolicy,
    verifier: Arc<dyn SessionVerifier>,
    timeout: Duration,
}

impl RouteGate {
    #[must_use]
    pub fn new(policy: RoutePolicy, verifier: Arc<dyn SessionVerifier>) -> Self {
        Self {
            policy,
            verifier,
            timeout: DEFAULT_VERIFY_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn policy(&self) -> &RoutePolicy {
        &self.policy
    }

    /// `requested` is the path, optionally with its query string; the whole
    /// value becomes the resume target.
    #[instrument(skip(self, credential), fields(has_credential = credential.is_some()))]
    pub async fn evaluate(&self, requested: &str, credential: Option<&str>) -> GateDecision {
        let path = requested.split('?').next().unwrap_or(requested);
        let credential = credential.map(str::trim).filter(|value| !value.is_empty());

        match (self.policy.classify(path), credential) {
            (PathClass::Excluded, _) | (PathClass::Public, None) => GateDecision::Allow,
            (PathClass::Public, Some(_)) => {
                GateDecision::Redirect(self.policy.landing_path().to_string())
            }
            (PathClass::Protected, None) => {
                debug!("No session credential");
                GateDecision::Redirect(self.policy.login_redirect(requested))
            }
            (PathClass::Protected, Some(credential)) => {
                match tokio::time::timeout(self.timeout, self.verifier.verify(credential)).await {
                    Ok(Ok(session)) => {
                        debug!(uid = %session.uid, "Session verified");
                        GateDecision::Allow
                    }
                    Ok(Err(VerifyError::SessionInvalid)) => {
                        debug!("Session invalid");
                        GateDecision::Reject(self.policy.login_redirect(requested))
                    }
                    Ok(Err(err)) => {
                        error!("Session verification failed: {err}");
                        GateDecision::Reject(self.policy.login_redirect(requested))
                    }
                    Err(_) => {
                        error!("{}", VerifyError::Timeout);
                        GateDecision::Reject(self.policy.login_redirect(requested))
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for RouteGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteGate")
            .field("policy", &self.policy)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
