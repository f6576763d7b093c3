//! Session issuance, verification and revocation.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    SessionError,
    clock::{SystemClock, WallClock},
    credential::{CredentialClaims, CredentialSigner, SessionCredential},
    identity::{IdentityAuthority, IdentityError},
    revocation::RevocationStore,
};

/// 14 days.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 14);

/// Verified view of a session, returned by `SessionStore::verify`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct SubjectClaims {
    pub uid: String,
    pub email: Option<String>,
    pub session_id: String,
    /// Unix milliseconds.
    pub issued_at: i64,
    /// Unix milliseconds.
    pub expires_at: i64,
}

impl From<CredentialClaims> for SubjectClaims {
    fn from(claims: CredentialClaims) -> Self {
        Self {
            uid: claims.sub,
            email: claims.email,
            session_id: claims.sid,
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}

#[derive(Debug)]
pub struct IssuedSession {
    pub credential: SessionCredential,
    pub claims: SubjectClaims,
}

/// Server-side trust boundary for session credentials.
///
/// Holds no per-request state; concurrent calls for the same or different
/// subjects are independent apart from the revocation store they share.
#[derive(Clone)]
pub struct SessionStore {
    authority: Arc<dyn IdentityAuthority>,
    revocations: Arc<dyn RevocationStore>,
    signer: Arc<CredentialSigner>,
    clock: Arc<dyn WallClock>,
    ttl: Duration,
}

impl SessionStore {
    #[must_use]
    pub fn new(
        authority: Arc<dyn IdentityAuthority>,
        revocations: Arc<dyn RevocationStore>,
        signer: CredentialSigner,
    ) -> Self {
        Self {
            authority,
            revocations,
            signer: Arc::new(signer),
            clock: Arc::new(SystemClock),
            ttl: DEFAULT_SESSION_TTL,
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn WallClock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Exchange an identity token for a session credential.
    ///
    /// # Errors
    /// `MissingToken` for an empty token, `CredentialInvalid` when the authority
    /// rejects it, `IdentityUnavailable` when the authority cannot answer.
    #[instrument(skip_all)]
    pub async fn issue(&self, id_token: &str) -> Result<IssuedSession, SessionError> {
        let id_token = id_token.trim();
        if id_token.is_empty() {
            return Err(SessionError::MissingToken);
        }

        let identity = self
            .authority
            .verify_id_token(id_token)
            .await
            .map_err(|err| match err {
                IdentityError::Rejected => SessionError::CredentialInvalid,
                IdentityError::Unavailable(reason) => SessionError::IdentityUnavailable(reason),
            })?;

        let mut issued_at = self.clock.now_unix_millis();
        // A revocation recorded in this same millisecond must not swallow the
        // credential minted right after it.
        let valid_after = self
            .revocations
            .valid_after(&identity.uid)
            .await
            .map_err(|err| SessionError::Revocation(err.to_string()))?;
        if let Some(valid_after) = valid_after {
            issued_at = issued_at.max(valid_after.saturating_add(1));
        }

        let ttl_millis = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        let claims = CredentialClaims {
            sid: Uuid::new_v4().to_string(),
            sub: identity.uid,
            email: identity.email,
            iat: issued_at,
            exp: issued_at.saturating_add(ttl_millis),
        };
        let credential = self
            .signer
            .sign(&claims)
            .map_err(|err| SessionError::Signing(err.to_string()))?;

        info!(uid = %claims.sub, sid = %claims.sid, "Session issued");

        Ok(IssuedSession {
            credential,
            claims: claims.into(),
        })
    }

    /// Verify signature, TTL and revocation state of a credential.
    ///
    /// The revocation store is consulted on every call.
    ///
    /// # Errors
    /// `SessionInvalid` for absent, malformed, expired or revoked credentials,
    /// `Revocation` when revocation state cannot be read (callers must deny).
    #[instrument(skip_all)]
    pub async fn verify(&self, credential: &str) -> Result<SubjectClaims, SessionError> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(SessionError::SessionInvalid);
        }

        let claims = self
            .signer
            .verify(credential, self.clock.now_unix_millis())
            .map_err(|err| {
                debug!("Session credential rejected: {err}");
                SessionError::SessionInvalid
            })?;

        match self.revocations.valid_after(&claims.sub).await {
            Ok(Some(valid_after)) if claims.iat <= valid_after => {
                debug!(uid = %claims.sub, "Session credential revoked");
                Err(SessionError::SessionInvalid)
            }
            Ok(_) => Ok(claims.into()),
            Err(err) => {
                error!("Failed to read revocation state: {err}");
                Err(SessionError::Revocation(err.to_string()))
            }
        }
    }

    /// Invalidate every outstanding credential for `subject`, effective immediately.
    ///
    /// # Errors
    /// Returns `Revocation` if the store cannot record the revocation.
    #[instrument(skip(self))]
    pub async fn revoke(&self, subject: &str) -> Result<(), SessionError> {
        if subject.trim().is_empty() {
            warn!("Ignoring revocation for empty subject");
            return Ok(());
        }
        let now = self.clock.now_unix_millis();
        self.revocations
            .revoke(subject, now)
            .await
            .map_err(|err| SessionError::Revocation(err.to_string()))?;
        info!(uid = %subject, "Sessions revoked");
        Ok(())
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("signer", &self.signer)
            .field("clock", &self.clock)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{BrokenRevocations, StaticAuthority, signer, store, store_with_clock};
    use super::*;
    use crate::session::clock::ManualWallClock;
    use anyhow::Result;

    #[tokio::test]
    async fn issue_then_verify_returns_same_subject() -> Result<()> {
        let store = store();
        let issued = store.issue("id:alice:alice@example.com").await?;
        let claims = store.verify(issued.credential.as_str()).await?;
        assert_eq!(claims.uid, "alice");
        assert_eq!(claims.email.as_deref(), Some("alice@example.com"));
        assert_eq!(claims, issued.claims);
        assert_eq!(
            claims.expires_at - claims.issued_at,
            1_209_600_000,
            "14 day TTL"
        );
        Ok(())
    }

    #[tokio::test]
    async fn issue_requires_token() {
        let result = store().issue("  ").await;
        assert!(matches!(result, Err(SessionError::MissingToken)));
    }

    #[tokio::test]
    async fn issue_rejected_token_is_credential_invalid() {
        let result = store().issue("forged").await;
        assert!(matches!(result, Err(SessionError::CredentialInvalid)));
    }

    #[tokio::test]
    async fn issue_with_unreachable_authority() {
        let result = store().issue("unavailable").await;
        assert!(matches!(result, Err(SessionError::IdentityUnavailable(_))));
    }

    #[tokio::test]
    async fn verify_rejects_garbage_and_empty() {
        let store = store();
        for credential in ["", "garbage", "v1.a.b"] {
            let result = store.verify(credential).await;
            assert!(matches!(result, Err(SessionError::SessionInvalid)), "{credential}");
        }
    }

    #[tokio::test]
    async fn verify_rejects_expired() -> Result<()> {
        let clock = Arc::new(ManualWallClock::new(1_000_000));
        let store = store_with_clock(clock.clone()).with_ttl(Duration::from_secs(60));
        let issued = store.issue("id:alice").await?;
        clock.advance(Duration::from_secs(59));
        assert!(store.verify(issued.credential.as_str()).await.is_ok());
        clock.advance(Duration::from_secs(1));
        let result = store.verify(issued.credential.as_str()).await;
        assert!(matches!(result, Err(SessionError::SessionInvalid)));
        Ok(())
    }

    #[tokio::test]
    async fn revoke_invalidates_earlier_credentials_before_ttl() -> Result<()> {
        let clock = Arc::new(ManualWallClock::new(1_000_000));
        let store = store_with_clock(clock.clone());
        let first = store.issue("id:alice").await?;
        clock.advance(Duration::from_secs(5));
        let second = store.issue("id:alice").await?;
        clock.advance(Duration::from_secs(5));

        store.revoke("alice").await?;

        for credential in [&first.credential, &second.credential] {
            let result = store.verify(credential.as_str()).await;
            assert!(matches!(result, Err(SessionError::SessionInvalid)));
        }
        Ok(())
    }

    #[tokio::test]
    async fn revoke_is_isolated_per_subject() -> Result<()> {
        let store = store();
        let alice = store.issue("id:alice").await?;
        let bob = store.issue("id:bob").await?;
        store.revoke("alice").await?;
        assert!(store.verify(alice.credential.as_str()).await.is_err());
        assert_eq!(store.verify(bob.credential.as_str()).await?.uid, "bob");
        Ok(())
    }

    #[tokio::test]
    async fn sign_in_after_revoke_in_same_millisecond_is_valid() -> Result<()> {
        // The manual clock does not move between these calls.
        let store = store();
        let old = store.issue("id:alice").await?;
        store.revoke("alice").await?;
        let fresh = store.issue("id:alice").await?;
        assert!(store.verify(old.credential.as_str()).await.is_err());
        assert_eq!(store.verify(fresh.credential.as_str()).await?.uid, "alice");
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_revocation_state_denies() -> Result<()> {
        let healthy = store();
        let issued = healthy.issue("id:alice").await?;
        let broken = SessionStore::new(
            Arc::new(StaticAuthority),
            Arc::new(BrokenRevocations),
            signer(),
        )
        .with_clock(Arc::new(ManualWallClock::new(1_700_000_000_000)));
        let result = broken.verify(issued.credential.as_str()).await;
        assert!(matches!(result, Err(SessionError::Revocation(_))));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_verify_for_same_subject() -> Result<()> {
        let store = store();
        let issued = store.issue("id:alice").await?;
        let credential = issued.credential.into_string();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let credential = credential.clone();
            handles.push(tokio::spawn(async move { store.verify(&credential).await }));
        }
        for handle in handles {
            assert_eq!(handle.await??.uid, "alice");
        }
        Ok(())
    }
}
