//! Client half of the session lifecycle.
//!
//! [`SessionClient`] caches at most one credential, which it cannot validate
//! itself; every validity question goes back to the server. [`SignOutOnIdle`]
//! connects it to the inactivity driver.

use reqwest::{Client, StatusCode, header::{COOKIE, SET_COOKIE}};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::{
    gate::VerifiedSession,
    inactivity::{InactivityHandle, SessionGeneration, TerminationHandler},
    session::cookie::{SESSION_COOKIE_NAME, credential_from_set_cookie},
};

pub const SESSION_PATH: &str = "/api/auth/session";
pub const VERIFY_PATH: &str = "/api/auth/verify";
pub const LOGOUT_PATH: &str = "/api/logout";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("identity token is required")]
    MissingToken,
    #[error("sign-in rejected")]
    CredentialInvalid,
    #[error("no session")]
    SessionInvalid,
    #[error("server answered without a session cookie")]
    MissingCookie,
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Deserialize)]
struct IssueResponse {
    uid: String,
}

#[derive(Deserialize)]
struct VerifyResponse {
    valid: bool,
    uid: String,
    #[serde(default)]
    email: Option<String>,
}

pub struct SessionClient {
    http: Client,
    base_url: Url,
    credential: RwLock<Option<SecretString>>,
}

impl SessionClient {
    /// # Errors
    /// Returns an error if the URL does not parse or the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = Client::builder().user_agent(crate::APP_USER_AGENT).build()?;
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            credential: RwLock::new(None),
        })
    }

    pub async fn has_credential(&self) -> bool {
        self.credential.read().await.is_some()
    }

    /// Exchange an identity token for a session; replaces any held credential.
    ///
    /// # Errors
    /// `MissingToken`/`CredentialInvalid` when the server refuses the token,
    /// `Status` or `Http` when it cannot be reached or misbehaves.
    #[instrument(skip_all)]
    pub async fn sign_in(&self, id_token: &str) -> Result<String, ClientError> {
        let response = self
            .http
            .post(self.base_url.join(SESSION_PATH)?)
            .json(&json!({ "idToken": id_token }))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::BAD_REQUEST => return Err(ClientError::MissingToken),
            StatusCode::UNAUTHORIZED => return Err(ClientError::CredentialInvalid),
            status => return Err(ClientError::Status(status)),
        }

        let credential = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(credential_from_set_cookie)
            .ok_or(ClientError::MissingCookie)?;
        let body: IssueResponse = response.json().await?;

        *self.credential.write().await = Some(SecretString::from(credential));
        info!(uid = %body.uid, "Signed in");
        Ok(body.uid)
    }

    /// Ask the server whether the held credential is still valid.
    ///
    /// # Errors
    /// `SessionInvalid` when there is no credential or the server says it is
    /// invalid.
    #[instrument(skip_all)]
    pub async fn verify(&self) -> Result<VerifiedSession, ClientError> {
        let Some(cookie) = self.cookie_header().await else {
            return Err(ClientError::SessionInvalid);
        };
        let response = self
            .http
            .get(self.base_url.join(VERIFY_PATH)?)
            .header(COOKIE, cookie)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body: VerifyResponse = response.json().await?;
                if body.valid {
                    Ok(VerifiedSession {
                        uid: body.uid,
                        email: body.email,
                    })
                } else {
                    Err(ClientError::SessionInvalid)
                }
            }
            StatusCode::UNAUTHORIZED => Err(ClientError::SessionInvalid),
            status => Err(ClientError::Status(status)),
        }
    }

    /// Revoke server side, then drop the local credential no matter what the
    /// server said. A credential from a sign-in that completed while the
    /// logout was in flight is kept.
    ///
    /// # Errors
    /// Reports the logout call failure; the credential is cleared regardless.
    #[instrument(skip_all)]
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        let signing_out = self.credential.read().await.clone();
        let cookie = signing_out.as_ref().map(session_cookie_header);
        let result = self.post_logout(cookie).await;
        {
            let mut held = self.credential.write().await;
            let replaced = match (held.as_ref(), signing_out.as_ref()) {
                (Some(current), Some(old)) => current.expose_secret() != old.expose_secret(),
                (Some(_), None) => true,
                (None, _) => false,
            };
            if replaced {
                debug!("Credential replaced during sign-out, keeping it");
            } else {
                held.take();
            }
        }
        if let Err(err) = &result {
            warn!("Logout request failed, credential cleared locally: {err}");
        } else {
            info!("Signed out");
        }
        result
    }

    async fn post_logout(&self, cookie: Option<String>) -> Result<(), ClientError> {
        let mut request = self.http.post(self.base_url.join(LOGOUT_PATH)?);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        let response = request.send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ClientError::Status(response.status()))
        }
    }

    async fn cookie_header(&self) -> Option<String> {
        self.credential.read().await.as_ref().map(session_cookie_header)
    }
}

fn session_cookie_header(credential: &SecretString) -> String {
    format!("{SESSION_COOKIE_NAME}={}", credential.expose_secret())
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Termination handler that signs out and then acknowledges the expired
/// generation.
///
/// Sign-out runs on its own task; the driver moves from `Expired` to `Idle`
/// once the acknowledgement arrives, unless a newer session has started.
#[derive(Debug)]
pub struct SignOutOnIdle {
    client: Arc<SessionClient>,
    driver: InactivityHandle,
}

impl SignOutOnIdle {
    #[must_use]
    pub fn new(client: Arc<SessionClient>, driver: InactivityHandle) -> Self {
        Self { client, driver }
    }
}

impl TerminationHandler for SignOutOnIdle {
    fn on_terminate(&mut self, generation: SessionGeneration) {
        let client = self.client.clone();
        let driver = self.driver.clone();
        tokio::spawn(async move {
            if let Err(err) = client.sign_out().await {
                error!("Idle sign-out failed: {err}");
            }
            if !driver.acknowledge_termination(generation) {
                debug!("Inactivity driver already stopped");
            }
        });
    }
}
