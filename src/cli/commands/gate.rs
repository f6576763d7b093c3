use anyhow::{Context, Result, anyhow};
use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_VERIFY_TIMEOUT_MS: &str = "verify-timeout-ms";
pub const ARG_VERIFY_URL: &str = "verify-url";
pub const ARG_LOGIN_PATH: &str = "login-path";
pub const ARG_LANDING_PATH: &str = "landing-path";
pub const ARG_PUBLIC_PATH: &str = "public-path";

pub struct Options {
    pub verify_timeout_ms: u64,
    pub verify_url: Option<String>,
    pub login_path: String,
    pub landing_path: String,
    pub public_paths: Vec<String>,
}

impl Options {
    /// # Errors
    /// Returns an error if a path is not absolute or the verify URL is invalid.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let verify_timeout_ms = matches
            .get_one::<u64>(ARG_VERIFY_TIMEOUT_MS)
            .copied()
            .unwrap_or(3000);

        let verify_url = matches.get_one::<String>(ARG_VERIFY_URL).cloned();
        if let Some(verify_url) = &verify_url {
            url::Url::parse(verify_url)
                .with_context(|| format!("invalid verify URL: {verify_url}"))?;
        }

        let login_path = absolute_path(matches, ARG_LOGIN_PATH, "/login")?;
        let landing_path = absolute_path(matches, ARG_LANDING_PATH, "/")?;

        let public_paths = matches
            .get_many::<String>(ARG_PUBLIC_PATH)
            .map(|paths| paths.cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        if let Some(path) = public_paths.iter().find(|path| !path.starts_with('/')) {
            return Err(anyhow!("--{ARG_PUBLIC_PATH} must start with '/': {path}"));
        }

        Ok(Self {
            verify_timeout_ms,
            verify_url,
            login_path,
            landing_path,
            public_paths,
        })
    }
}

fn absolute_path(matches: &ArgMatches, arg: &str, default: &str) -> Result<String> {
    let path = matches
        .get_one::<String>(arg)
        .cloned()
        .unwrap_or_else(|| default.to_string());
    if path.starts_with('/') {
        Ok(path)
    } else {
        Err(anyhow!("--{arg} must start with '/': {path}"))
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERIFY_TIMEOUT_MS)
                .long(ARG_VERIFY_TIMEOUT_MS)
                .help("Timeout for session verification during route gating, in milliseconds")
                .env("IDLEGATE_VERIFY_TIMEOUT_MS")
                .default_value("3000")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_VERIFY_URL)
                .long(ARG_VERIFY_URL)
                .help("Verify sessions against this endpoint instead of in process")
                .env("IDLEGATE_VERIFY_URL"),
        )
        .arg(
            Arg::new(ARG_LOGIN_PATH)
                .long(ARG_LOGIN_PATH)
                .help("Where unauthenticated navigation is redirected")
                .env("IDLEGATE_LOGIN_PATH")
                .default_value("/login"),
        )
        .arg(
            Arg::new(ARG_LANDING_PATH)
                .long(ARG_LANDING_PATH)
                .help("Where authenticated visitors of public pages are redirected")
                .env("IDLEGATE_LANDING_PATH")
                .default_value("/"),
        )
        .arg(
            Arg::new(ARG_PUBLIC_PATH)
                .long(ARG_PUBLIC_PATH)
                .help("Path reachable without a session (repeatable, the login path is always public)")
                .env("IDLEGATE_PUBLIC_PATHS")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
}
