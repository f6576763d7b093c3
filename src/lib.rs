//! # Idlegate (Session Lifecycle & Inactivity Logout)
//!
//! `idlegate` issues server-trusted session credentials from identity tokens
//! minted by an external identity authority, gates navigation on those
//! credentials, and terminates idle sessions on the client side.
//!
//! ## Session Credentials
//!
//! A credential is an opaque, HMAC-signed, time-bounded token carried in the
//! `session` cookie (`HttpOnly; Secure; SameSite=Lax; Path=/`). Validity needs
//! both a good signature/TTL and a backing session that has not been revoked.
//!
//! - **Issuance:** the identity token is verified by the external authority
//!   before a credential is minted with a 14 day TTL.
//! - **Verification:** revocation is checked on every call and never cached.
//! - **Revocation:** invalidates every outstanding credential for a subject
//!   immediately, regardless of TTL.
//!
//! ## Route Gating
//!
//! Protected paths require a verified credential. Anything short of a positive
//! verification (invalid, revoked, timeout, transport error) redirects to the
//! login page with the requested path attached as a resume target.
//!
//! ## Inactivity Logout
//!
//! The client runs a deadline-driven state machine (`Idle`, `Monitoring`,
//! `Warning`, `Expired`). After 29 minutes without activity a 60 second
//! countdown starts; while it runs only an explicit dismissal keeps the
//! session. When the countdown reaches zero the termination callback fires
//! exactly once.

pub mod api;
pub mod cli;
pub mod client;
pub mod gate;
pub mod inactivity;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
