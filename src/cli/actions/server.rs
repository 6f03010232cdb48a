use crate::{
    api::{self, Portal},
    auth::{AuthConfig, AuthOrchestrator},
    backend::{RestBackend, SessionFile},
    cli::telemetry,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub service_url: String,
    pub anon_key: SecretString,
    pub session_file: Option<String>,
    pub auth: AuthConfig,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the service URL is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let mut backend = RestBackend::new(&args.service_url, args.anon_key)
        .context("Failed to configure the hosted service client")?;

    if let Some(path) = &args.session_file {
        debug!("Persisting sessions in {}", path);
        backend = backend.with_session_file(SessionFile::new(path));
    }

    let backend = Arc::new(backend);
    let auth = AuthOrchestrator::new(backend.clone(), backend.clone(), args.auth);

    // Restores the persisted session before the listener binds.
    let listener = auth.start().await;

    info!("Connected to {}", args.service_url);

    let result = api::serve(args.port, Portal { auth, data: backend }).await;

    listener.abort();
    telemetry::shutdown_tracer();

    result
}
