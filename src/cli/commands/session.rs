use anyhow::{Context, Result, anyhow};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::session::credential::MIN_SECRET_LEN;

pub const ARG_IDENTITY_URL: &str = "identity-url";
pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";

pub struct Options {
    pub identity_url: String,
    pub session_secret: SecretString,
    pub session_ttl_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if a required argument is missing or the secret is too short.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let identity_url = matches
            .get_one::<String>(ARG_IDENTITY_URL)
            .cloned()
            .context("missing required argument: --identity-url")?;
        url::Url::parse(&identity_url)
            .with_context(|| format!("invalid identity URL: {identity_url}"))?;

        let secret = matches
            .get_one::<String>(ARG_SESSION_SECRET)
            .cloned()
            .context("missing required argument: --session-secret")?;
        if secret.len() < MIN_SECRET_LEN {
            return Err(anyhow!(
                "--{ARG_SESSION_SECRET} must be at least {MIN_SECRET_LEN} bytes"
            ));
        }

        let session_ttl_seconds = matches
            .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
            .copied()
            .unwrap_or(1_209_600);
        if session_ttl_seconds == 0 {
            return Err(anyhow!("--{ARG_SESSION_TTL_SECONDS} must be greater than zero"));
        }

        Ok(Self {
            identity_url,
            session_secret: SecretString::from(secret),
            session_ttl_seconds,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_IDENTITY_URL)
                .long(ARG_IDENTITY_URL)
                .help("Identity authority token verification endpoint")
                .env("IDLEGATE_IDENTITY_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Key used to sign session credentials (at least 32 bytes)")
                .env("IDLEGATE_SESSION_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session credential and cookie TTL in seconds")
                .env("IDLEGATE_SESSION_TTL_SECONDS")
                .default_value("1209600")
                .value_parser(clap::value_parser!(u64)),
        )
}
