pub mod auth;
pub mod logging;
pub mod service;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

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

    let command = Command::new("scoutpost")
        .about("Scouting group administration and parent portal")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("SCOUTPOST_PORT")
                .value_parser(clap::value_parser!(u16)),
        );

    let command = service::with_args(command);
    let command = auth::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "scoutpost");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Scouting group administration and parent portal".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_check_port_and_service() {
        temp_env::with_vars(
            [
                ("SCOUTPOST_SERVICE_URL", None::<&str>),
                ("SCOUTPOST_ANON_KEY", None::<&str>),
                ("SCOUTPOST_SESSION_FILE", None::<&str>),
            ],
            || {
                let matches = new().get_matches_from(vec![
                    "scoutpost",
                    "--port",
                    "9090",
                    "--service-url",
                    "https://project.example.co",
                    "--anon-key",
                    "anon",
                ]);

                assert_eq!(matches.get_one::<u16>("port").copied(), Some(9090));
                let options = service::Options::parse(&matches).unwrap_or_else(|err| panic!("{err}"));
                assert_eq!(options.url, "https://project.example.co");
                assert_eq!(options.anon_key.expose_secret(), "anon");
                assert_eq!(options.session_file, None);
            },
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("SCOUTPOST_PORT", Some("443")),
                ("SCOUTPOST_SERVICE_URL", Some("https://project.example.co")),
                ("SCOUTPOST_ANON_KEY", Some("anon")),
                ("SCOUTPOST_SESSION_FILE", Some("/tmp/scoutpost-session.json")),
                ("SCOUTPOST_BOOTSTRAP_TIMEOUT_MS", Some("2000")),
                ("SCOUTPOST_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["scoutpost"]);
                assert_eq!(matches.get_one::<u16>("port").copied(), Some(443));
                assert_eq!(
                    matches.get_one::<String>(service::ARG_SESSION_FILE).cloned(),
                    Some("/tmp/scoutpost-session.json".to_string())
                );
                assert_eq!(
                    matches.get_one::<u64>(auth::ARG_BOOTSTRAP_TIMEOUT_MS).copied(),
                    Some(2000)
                );
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(
                [
                    ("SCOUTPOST_LOG_LEVEL", Some(level)),
                    ("SCOUTPOST_SERVICE_URL", Some("https://project.example.co")),
                    ("SCOUTPOST_ANON_KEY", Some("anon")),
                ],
                || {
                    let matches = new().get_matches_from(vec!["scoutpost"]);
                    assert_eq!(
                        matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                        u8::try_from(index).ok()
                    );
                },
            );
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for index in 0..5 {
            temp_env::with_vars([("SCOUTPOST_LOG_LEVEL", None::<String>)], || {
                let mut args = vec![
                    "scoutpost".to_string(),
                    "--service-url".to_string(),
                    "https://project.example.co".to_string(),
                    "--anon-key".to_string(),
                    "anon".to_string(),
                ];

                // Add the appropriate number of "-v" flags based on the index
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
    fn test_missing_service_url_fails() {
        temp_env::with_vars(
            [
                ("SCOUTPOST_SERVICE_URL", None::<&str>),
                ("SCOUTPOST_ANON_KEY", Some("anon")),
            ],
            || {
                let result = new().try_get_matches_from(vec!["scoutpost"]);
                assert_eq!(
                    result.map_err(|e| e.kind()).err(),
                    Some(clap::error::ErrorKind::MissingRequiredArgument)
                );
            },
        );
    }
}
