use crate::auth::{AuthConfig, ResolvePolicy};
use clap::{Arg, ArgMatches, Command};
use std::time::Duration;

pub const ARG_BOOTSTRAP_TIMEOUT_MS: &str = "bootstrap-timeout-ms";
pub const ARG_PROFILE_BUDGET_MS: &str = "profile-budget-ms";

#[derive(Debug)]
pub struct Options {
    pub bootstrap_timeout_ms: u64,
    pub profile_budget_ms: u64,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            bootstrap_timeout_ms: matches
                .get_one::<u64>(ARG_BOOTSTRAP_TIMEOUT_MS)
                .copied()
                .unwrap_or(3000),
            profile_budget_ms: matches
                .get_one::<u64>(ARG_PROFILE_BUDGET_MS)
                .copied()
                .unwrap_or(5000),
        }
    }

    #[must_use]
    pub fn config(&self) -> AuthConfig {
        AuthConfig::default()
            .with_bootstrap_timeout(Duration::from_millis(self.bootstrap_timeout_ms))
            .with_resolve_policy(
                ResolvePolicy::default().with_budget(Duration::from_millis(self.profile_budget_ms)),
            )
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BOOTSTRAP_TIMEOUT_MS)
                .long(ARG_BOOTSTRAP_TIMEOUT_MS)
                .help("Deadline for restoring the persisted session on start, in milliseconds")
                .env("SCOUTPOST_BOOTSTRAP_TIMEOUT_MS")
                .default_value("3000")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_PROFILE_BUDGET_MS)
                .long(ARG_PROFILE_BUDGET_MS)
                .help("Total time spent waiting for a new account's profile, in milliseconds")
                .env("SCOUTPOST_PROFILE_BUDGET_MS")
                .default_value("5000")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_defaults() {
        let matches = with_args(Command::new("scoutpost")).get_matches_from(vec!["scoutpost"]);
        let config = Options::parse(&matches).config();
        assert_eq!(config.bootstrap_timeout(), Duration::from_secs(3));
        assert_eq!(config.resolve_policy().budget(), Duration::from_secs(5));
    }

    #[test]
    fn config_from_flags() {
        let matches = with_args(Command::new("scoutpost")).get_matches_from(vec![
            "scoutpost",
            "--bootstrap-timeout-ms",
            "1500",
            "--profile-budget-ms",
            "8000",
        ]);
        let config = Options::parse(&matches).config();
        assert_eq!(config.bootstrap_timeout(), Duration::from_millis(1500));
        assert_eq!(config.resolve_policy().budget(), Duration::from_secs(8));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let result = with_args(Command::new("scoutpost")).try_get_matches_from(vec![
            "scoutpost",
            "--bootstrap-timeout-ms",
            "0",
        ]);
        assert!(result.is_err());
    }
}
