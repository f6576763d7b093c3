pub mod gate;
pub mod logging;
pub mod session;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const ARG_PORT: &str = "port";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("idlegate")
        .about("Session lifecycle and inactivity logout")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("IDLEGATE_PORT")
                .value_parser(clap::value_parser!(u16)),
        );

    let command = session::with_args(command);
    let command = gate::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn with_cleared_env<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        temp_env::with_vars(
            [
                ("IDLEGATE_PORT", None::<&str>),
                ("IDLEGATE_IDENTITY_URL", None),
                ("IDLEGATE_SESSION_SECRET", None),
                ("IDLEGATE_SESSION_TTL_SECONDS", None),
                ("IDLEGATE_VERIFY_TIMEOUT_MS", None),
                ("IDLEGATE_VERIFY_URL", None),
                ("IDLEGATE_LOGIN_PATH", None),
                ("IDLEGATE_LANDING_PATH", None),
                ("IDLEGATE_PUBLIC_PATHS", None),
                ("IDLEGATE_LOG_LEVEL", None),
            ],
            f,
        )
    }

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "idlegate");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Session lifecycle and inactivity logout".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_defaults() {
        with_cleared_env(|| {
            let matches = new().get_matches_from(vec![
                "idlegate",
                "--identity-url",
                "https://identity.tld/verify",
                "--session-secret",
                SECRET,
            ]);
            assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(8080));
            assert_eq!(
                matches.get_one::<u64>(session::ARG_SESSION_TTL_SECONDS).copied(),
                Some(1_209_600)
            );
            assert_eq!(
                matches.get_one::<u64>(gate::ARG_VERIFY_TIMEOUT_MS).copied(),
                Some(3000)
            );
            assert_eq!(
                matches.get_one::<String>(gate::ARG_LOGIN_PATH).cloned(),
                Some("/login".to_string())
            );
            assert_eq!(matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(), Some(0));
        });
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("IDLEGATE_PORT", Some("443")),
                ("IDLEGATE_IDENTITY_URL", Some("https://identity.tld/verify")),
                ("IDLEGATE_SESSION_SECRET", Some(SECRET)),
                ("IDLEGATE_PUBLIC_PATHS", Some("/about,/help")),
                ("IDLEGATE_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["idlegate"]);
                assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(443));
                assert_eq!(
                    matches.get_one::<String>(session::ARG_IDENTITY_URL).cloned(),
                    Some("https://identity.tld/verify".to_string())
                );
                let public: Vec<String> = matches
                    .get_many::<String>(gate::ARG_PUBLIC_PATH)
                    .map(|paths| paths.cloned().collect())
                    .unwrap_or_default();
                assert_eq!(public, vec!["/about".to_string(), "/help".to_string()]);
                assert_eq!(matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(), Some(2));
            },
        );
    }

    #[test]
    fn test_check_log_level_verbosity() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, _) in levels.iter().enumerate() {
            with_cleared_env(|| {
                let mut args = vec![
                    "idlegate".to_string(),
                    "--identity-url".to_string(),
                    "https://identity.tld/verify".to_string(),
                    "--session-secret".to_string(),
                    SECRET.to_string(),
                ];

                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }

                let matches = new().get_matches_from(args);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_missing_required() {
        with_cleared_env(|| {
            let result = new().try_get_matches_from(vec!["idlegate"]);
            assert_eq!(
                result.map_err(|e| e.kind()).err(),
                Some(clap::error::ErrorKind::MissingRequiredArgument)
            );
        });
    }
}
