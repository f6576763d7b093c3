//! External identity authority.
//!
//! Identity tokens are never inspected locally: signature and expiry checks are
//! delegated to the authority, which answers with the verified subject.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::{collections::HashMap, time::Duration};
use thiserror::Error;
use tracing::{error, instrument, warn};

const AUTHORITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Subject confirmed by the identity authority.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct VerifiedIdentity {
    #[serde(alias = "sub")]
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity token rejected")]
    Rejected,
    #[error("identity authority unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait IdentityAuthority: Send + Sync {
    /// Verify an identity token's signature and expiry.
    async fn verify_id_token(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError>;
}

/// Authority reached over HTTP: `POST {url}` with `{"token": "..."}`.
///
/// `200` carries the verified identity, any other `4xx` is a rejection,
/// everything else means the authority could not give an answer.
#[derive(Debug, Clone)]
pub struct HttpIdentityAuthority {
    client: Client,
    url: String,
}

impl HttpIdentityAuthority {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: String) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(AUTHORITY_TIMEOUT)
            .build()
            .map_err(|err| IdentityError::Unavailable(err.to_string()))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl IdentityAuthority for HttpIdentityAuthority {
    #[instrument(skip_all, fields(url = %self.url))]
    async fn verify_id_token(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let mut body = HashMap::new();
        body.insert("token", id_token);

        let response = match self.client.post(&self.url).json(&body).send().await {
            Ok(response) => response,
            Err(err) => {
                error!("Error reaching identity authority: {err}");
                return Err(IdentityError::Unavailable(err.to_string()));
            }
        };

        let status = response.status();
        if status == StatusCode::OK {
            let identity: VerifiedIdentity = response.json().await.map_err(|err| {
                error!("Invalid identity authority response: {err}");
                IdentityError::Unavailable(err.to_string())
            })?;
            if identity.uid.trim().is_empty() {
                warn!("Identity authority returned an empty subject");
                return Err(IdentityError::Rejected);
            }
            Ok(identity)
        } else if status.is_client_error() {
            warn!("Identity token rejected: {status}");
            Err(IdentityError::Rejected)
        } else {
            error!("Identity authority failure: {status}");
            Err(IdentityError::Unavailable(format!("status {status}")))
        }
    }
}
