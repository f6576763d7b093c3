//! Server-side session trust boundary.
//!
//! Flow Overview:
//! 1) `issue`: the external identity authority validates an identity token;
//!    on success a signed credential bound to the verified subject is minted.
//! 2) `verify`: signature and TTL are checked locally, then the revocation
//!    store is consulted. Nothing about revocation is cached.
//! 3) `revoke`: records a per-subject boundary; credentials issued at or before
//!    it fail verification from then on.
//!
//! Security boundaries: the client only caches the credential and cannot
//! validate it; this module is the sole authority on validity.

pub mod clock;
pub mod cookie;
pub mod credential;
pub mod identity;
pub mod revocation;
mod store;

pub use credential::{CredentialSigner, SessionCredential};
pub use identity::{HttpIdentityAuthority, IdentityAuthority, VerifiedIdentity};
pub use revocation::{MemoryRevocationStore, RevocationStore};
pub use store::{DEFAULT_SESSION_TTL, IssuedSession, SessionStore, SubjectClaims};

#[cfg(test)]
pub(crate) use store::test_support;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// No identity token was supplied at issuance.
    #[error("identity token is required")]
    MissingToken,
    /// The identity authority rejected the token.
    #[error("invalid identity token")]
    CredentialInvalid,
    /// The identity authority could not be reached or answered with an error.
    #[error("identity authority unavailable: {0}")]
    IdentityUnavailable(String),
    /// Credential missing, malformed, expired or revoked.
    #[error("invalid session")]
    SessionInvalid,
    /// Revocation state could not be read or written.
    #[error("revocation store failure: {0}")]
    Revocation(String),
    #[error("failed to sign credential: {0}")]
    Signing(String),
}
