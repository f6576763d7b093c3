//! Signed session credentials.
//!
//! Wire format: `v1.<base64url(json claims)>.<base64url(hmac-sha256)>`.
//! The MAC covers `v1.<payload>` and is checked before the payload is decoded,
//! so unauthenticated bytes never reach the JSON parser.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const CREDENTIAL_VERSION: &str = "v1";
/// Minimum signing secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Claims carried inside a credential. Timestamps are unix milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialClaims {
    /// Session id, unique per issuance.
    pub sid: String,
    /// Subject (user) id verified by the identity authority.
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("invalid credential format")]
    Format,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid claims")]
    Claims,
    #[error("invalid signature")]
    Signature,
    #[error("credential expired")]
    Expired,
    #[error("signing key must be at least {MIN_SECRET_LEN} bytes")]
    WeakKey,
}

/// Opaque credential handed to the client. Never logged in full.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredential(String);

impl SessionCredential {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionCredential(***)")
    }
}

pub struct CredentialSigner {
    key: SecretString,
}

impl CredentialSigner {
    /// # Errors
    /// Returns `CredentialError::WeakKey` if the secret is shorter than `MIN_SECRET_LEN`.
    pub fn new(key: SecretString) -> Result<Self, CredentialError> {
        if key.expose_secret().len() < MIN_SECRET_LEN {
            return Err(CredentialError::WeakKey);
        }
        Ok(Self { key })
    }

    /// # Errors
    /// Returns an error if the claims cannot be serialized.
    pub fn sign(&self, claims: &CredentialClaims) -> Result<SessionCredential, CredentialError> {
        let json = serde_json::to_vec(claims).map_err(|_| CredentialError::Claims)?;
        let payload = Base64UrlUnpadded::encode_string(&json);
        let signing_input = format!("{CREDENTIAL_VERSION}.{payload}");
        let tag = self.mac(&signing_input)?.finalize().into_bytes();
        let signature = Base64UrlUnpadded::encode_string(&tag);
        Ok(SessionCredential(format!("{signing_input}.{signature}")))
    }

    /// Check format, signature and expiry against `now_millis`.
    ///
    /// Revocation is not checked here; that requires the revocation store.
    ///
    /// # Errors
    /// Returns the first failing check.
    pub fn verify(&self, token: &str, now_millis: i64) -> Result<CredentialClaims, CredentialError> {
        let mut parts = token.split('.');
        let (Some(version), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CredentialError::Format);
        };
        if version != CREDENTIAL_VERSION || payload.is_empty() || signature.is_empty() {
            return Err(CredentialError::Format);
        }

        let signature =
            Base64UrlUnpadded::decode_vec(signature).map_err(|_| CredentialError::Base64)?;
        self.mac(&format!("{version}.{payload}"))?
            .verify_slice(&signature)
            .map_err(|_| CredentialError::Signature)?;

        let json = Base64UrlUnpadded::decode_vec(payload).map_err(|_| CredentialError::Base64)?;
        let claims: CredentialClaims =
            serde_json::from_slice(&json).map_err(|_| CredentialError::Claims)?;
        if claims.sub.is_empty() || claims.iat > claims.exp {
            return Err(CredentialError::Claims);
        }
        if now_millis >= claims.exp {
            return Err(CredentialError::Expired);
        }
        Ok(claims)
    }

    fn mac(&self, signing_input: &str) -> Result<HmacSha256, CredentialError> {
        let mut mac = HmacSha256::new_from_slice(self.key.expose_secret().as_bytes())
            .map_err(|_| CredentialError::WeakKey)?;
        mac.update(signing_input.as_bytes());
        Ok(mac)
    }
}

impl fmt::Debug for CredentialSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSigner")
            .field("key", &"***")
            .finish()
    }
}
