use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SERVICE_URL: &str = "service-url";
pub const ARG_ANON_KEY: &str = "anon-key";
pub const ARG_SESSION_FILE: &str = "session-file";

/// Connection settings for the hosted auth + data service.
#[derive(Debug)]
pub struct Options {
    pub url: String,
    pub anon_key: SecretString,
    pub session_file: Option<String>,
}

impl Options {
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let url = matches
            .get_one::<String>(ARG_SERVICE_URL)
            .cloned()
            .context("missing required argument: --service-url")?;
        let anon_key = matches
            .get_one::<String>(ARG_ANON_KEY)
            .cloned()
            .map(SecretString::from)
            .context("missing required argument: --anon-key")?;

        Ok(Self {
            url,
            anon_key,
            session_file: matches.get_one::<String>(ARG_SESSION_FILE).cloned(),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SERVICE_URL)
                .long(ARG_SERVICE_URL)
                .help("Base URL of the hosted auth and data service, example: https://project.example.co")
                .env("SCOUTPOST_SERVICE_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_ANON_KEY)
                .long(ARG_ANON_KEY)
                .help("Public API key of the hosted service")
                .env("SCOUTPOST_ANON_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_FILE)
                .long(ARG_SESSION_FILE)
                .help("File where the signed-in session is kept so it can be restored on start")
                .env("SCOUTPOST_SESSION_FILE"),
        )
}
