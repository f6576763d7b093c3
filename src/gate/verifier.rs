//! Credential verification as seen by the gate.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header::COOKIE};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::session::{SessionError, SessionStore, SubjectClaims, cookie::SESSION_COOKIE_NAME};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedSession {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl From<SubjectClaims> for VerifiedSession {
    fn from(claims: SubjectClaims) -> Self {
        Self {
            uid: claims.uid,
            email: claims.email,
        }
    }
}

#[derive(Debug, Error)]
pub enum VerifyError {
    /// Missing, expired, revoked or malformed.
    #[error("session invalid")]
    SessionInvalid,
    #[error("verification timed out")]
    Timeout,
    /// Transport failure or an answer that could not be understood.
    #[error("verification unavailable: {0}")]
    Network(String),
}

#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<VerifiedSession, VerifyError>;
}

/// Verifies in process against the session store.
#[derive(Clone, Debug)]
pub struct StoreVerifier {
    store: SessionStore,
}

impl StoreVerifier {
    #[must_use]
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SessionVerifier for StoreVerifier {
    async fn verify(&self, credential: &str) -> Result<VerifiedSession, VerifyError> {
        match self.store.verify(credential).await {
            Ok(claims) => Ok(claims.into()),
            Err(SessionError::Revocation(reason)) => Err(VerifyError::Network(reason)),
            Err(_) => Err(VerifyError::SessionInvalid),
        }
    }
}

#[derive(Deserialize)]
struct VerifyResponse {
    valid: bool,
    #[serde(default)]
    uid: String,
    #[serde(default)]
    email: Option<String>,
}

/// Calls a remote verification endpoint, forwarding the credential as the
/// session cookie.
#[derive(Clone, Debug)]
pub struct HttpSessionVerifier {
    client: Client,
    url: String,
}

impl HttpSessionVerifier {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: String) -> Result<Self, VerifyError> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .map_err(|err| VerifyError::Network(err.to_string()))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl SessionVerifier for HttpSessionVerifier {
    #[instrument(skip_all, fields(url = %self.url))]
    async fn verify(&self, credential: &str) -> Result<VerifiedSession, VerifyError> {
        let response = self
            .client
            .get(&self.url)
            .header(COOKIE, format!("{SESSION_COOKIE_NAME}={credential}"))
            .send()
            .await
            .map_err(|err| VerifyError::Network(err.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body: VerifyResponse = response
                    .json()
                    .await
                    .map_err(|err| VerifyError::Network(err.to_string()))?;
                if body.valid && !body.uid.is_empty() {
                    Ok(VerifiedSession {
                        uid: body.uid,
                        email: body.email,
                    })
                } else {
                    debug!("Verification endpoint answered 200 without a valid session");
                    Err(VerifyError::SessionInvalid)
                }
            }
            StatusCode::UNAUTHORIZED => Err(VerifyError::SessionInvalid),
            status => Err(VerifyError::Network(format!("status {status}"))),
        }
    }
}
