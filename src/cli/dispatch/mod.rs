//! Maps validated CLI arguments to the action to run.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_PORT, gate, session};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);

    let session_opts = session::Options::parse(matches)?;
    let gate_opts = gate::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        identity_url: session_opts.identity_url,
        session_secret: session_opts.session_secret,
        session_ttl_seconds: session_opts.session_ttl_seconds,
        verify_timeout_ms: gate_opts.verify_timeout_ms,
        verify_url: gate_opts.verify_url,
        login_path: gate_opts.login_path,
        landing_path: gate_opts.landing_path,
        public_paths: gate_opts.public_paths,
    }))
}
