use crate::{
    api,
    cli::globals::GlobalArgs,
    gate::{HttpSessionVerifier, RouteGate, RoutePolicy, SessionVerifier, StoreVerifier},
    session::{CredentialSigner, HttpIdentityAuthority, MemoryRevocationStore, SessionStore},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub identity_url: String,
    pub session_secret: SecretString,
    pub session_ttl_seconds: u64,
    pub verify_timeout_ms: u64,
    pub verify_url: Option<String>,
    pub login_path: String,
    pub landing_path: String,
    pub public_paths: Vec<String>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the session store cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let globals = GlobalArgs::new(args.identity_url, args.session_secret);
    debug!("Global args: {:?}", globals);

    let authority = HttpIdentityAuthority::new(globals.identity_url.clone())
        .context("Failed to build identity authority client")?;
    let signer = CredentialSigner::new(globals.session_secret.clone())
        .context("Invalid session secret")?;
    let store = SessionStore::new(
        Arc::new(authority),
        Arc::new(MemoryRevocationStore::new()),
        signer,
    )
    .with_ttl(Duration::from_secs(args.session_ttl_seconds));

    let verifier: Arc<dyn SessionVerifier> = match args.verify_url {
        Some(url) => {
            info!("Gating pages against {url}");
            Arc::new(HttpSessionVerifier::new(url).context("Failed to build verify client")?)
        }
        None => Arc::new(StoreVerifier::new(store.clone())),
    };

    let policy = RoutePolicy::new(&args.login_path, &args.landing_path)
        .with_public_paths(args.public_paths);
    let gate = RouteGate::new(policy, verifier)
        .with_timeout(Duration::from_millis(args.verify_timeout_ms));

    api::new(args.port, store, gate).await
}
