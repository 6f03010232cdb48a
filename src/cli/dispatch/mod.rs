//! Maps validated CLI arguments to the action the binary runs.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{auth, service};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let service = service::Options::parse(matches)?;
    let auth = auth::Options::parse(matches);

    Ok(Action::Server(Args {
        port,
        service_url: service.url,
        anon_key: service.anon_key,
        session_file: service.session_file,
        auth: auth.config(),
    }))
}
