use super::{
    machine::{Applied, AuthEvent, Machine, Ticket},
    resolver::{AttemptError, ProfileResolver, ResolveError, ResolvePolicy},
    types::{AuthState, Profile, Role, Status},
};
use crate::backend::{AuthService, DataService, Identity, Session, SessionEvent};
use secrecy::SecretString;
use serde::Serialize;
use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tokio::{
    sync::{broadcast::error::RecvError, watch},
    task::JoinHandle,
};
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthConfig {
    bootstrap_timeout: Duration,
    resolve: ResolvePolicy,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bootstrap_timeout: Duration::from_secs(3),
            resolve: ResolvePolicy::default(),
        }
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_bootstrap_timeout(mut self, timeout: Duration) -> Self {
        self.bootstrap_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_resolve_policy(mut self, policy: ResolvePolicy) -> Self {
        self.resolve = policy;
        self
    }

    #[must_use]
    pub fn bootstrap_timeout(&self) -> Duration {
        self.bootstrap_timeout
    }

    #[must_use]
    pub fn resolve_policy(&self) -> &ResolvePolicy {
        &self.resolve
    }
}

/// What a login produced, for routing right after the call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct LoginOutcome {
    pub role: Option<Role>,
    pub status: Option<Status>,
    pub error: Option<String>,
}

impl LoginOutcome {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

impl From<Result<Profile, ResolveError>> for LoginOutcome {
    fn from(outcome: Result<Profile, ResolveError>) -> Self {
        match outcome {
            Ok(profile) => Self {
                role: profile.role,
                status: Some(profile.status),
                error: None,
            },
            Err(err) => Self::failed(err.to_string()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SignUpOutcome {
    /// Whether the service signed the new account in right away.
    pub session_issued: bool,
    pub error: Option<String>,
}

/// Single owner of the authentication state.
///
/// Callers observe the state through [`AuthOrchestrator::subscribe`] and change
/// it only through `login`, `sign_up` and `logout`. Session notifications from
/// the service are consumed by the task started in [`AuthOrchestrator::listen`].
pub struct AuthOrchestrator {
    auth: Arc<dyn AuthService>,
    resolver: ProfileResolver,
    config: AuthConfig,
    machine: Mutex<Machine>,
    state: watch::Sender<AuthState>,
}

impl std::fmt::Debug for AuthOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthOrchestrator")
            .field("config", &self.config)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl AuthOrchestrator {
    #[must_use]
    pub fn new(
        auth: Arc<dyn AuthService>,
        data: Arc<dyn DataService>,
        config: AuthConfig,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(AuthState::bootstrapping());
        Arc::new(Self {
            auth,
            resolver: ProfileResolver::new(data, config.resolve_policy().clone()),
            config,
            machine: Mutex::new(Machine::new()),
            state,
        })
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.lock().session().identity().cloned()
    }

    /// Subscribes to session notifications and restores the persisted
    /// session. Returns the listener task.
    pub async fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let listener = self.listen();
        self.bootstrap().await;
        listener
    }

    /// Spawns the task that feeds session notifications into the state.
    /// The task ends when the orchestrator is dropped or the service closes
    /// its notification channel.
    pub fn listen(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.auth.subscribe();
        let orchestrator = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(orchestrator) = orchestrator.upgrade() else {
                            break;
                        };
                        orchestrator.on_session_event(event);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Dropped {} session notifications", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Session listener stopped");
        })
    }

    /// Restores the persisted session within the bootstrap deadline. When the
    /// deadline passes or restoring fails, the state is forced to signed out
    /// and late results of the abandoned restore are never applied.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) {
        let deadline = self.config.bootstrap_timeout();

        let failure = match tokio::time::timeout(deadline, self.restore()).await {
            Ok(Ok(restored)) => {
                if let Some((session, profile)) = &restored {
                    info!(
                        user = %session.identity.email,
                        role = ?profile.role,
                        "Session restored"
                    );
                }
                self.dispatch(AuthEvent::BootstrapSettled { restored });
                return;
            }
            Ok(Err(err)) => format!("session restore failed: {err}"),
            Err(_) => format!("session restore exceeded {}ms", deadline.as_millis()),
        };

        error!("Auth bootstrap fail-safe triggered: {}", failure);
        if self.dispatch(AuthEvent::BootstrapFailed) == Applied::Discarded {
            debug!("Session already settled by a login, keeping it");
            return;
        }
        if let Err(err) = self.auth.sign_out().await {
            error!("Failed to clear the stored session: {}", err);
        }
    }

    async fn restore(&self) -> Result<Option<(Session, Profile)>, AttemptError> {
        let Some(session) = self.auth.current_session().await? else {
            return Ok(None);
        };
        let profile = self
            .resolver
            .resolve_once(session.identity.id, self.config.bootstrap_timeout())
            .await?;
        Ok(Some((session, profile)))
    }

    /// Signs in and resolves the profile before returning, so the caller can
    /// route on the outcome.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> LoginOutcome {
        self.dispatch(AuthEvent::Submitting);

        let session = match self.auth.sign_in_with_password(email, password).await {
            Ok(session) => session,
            Err(err) => {
                warn!("Sign-in rejected: {}", err);
                self.dispatch(AuthEvent::SignInRejected);
                return LoginOutcome::failed(err.to_string());
            }
        };

        let Applied::Resolving(ticket) = self.dispatch(AuthEvent::SignedIn(session)) else {
            return LoginOutcome::failed("Sign-in could not be completed.");
        };
        let outcome = LoginOutcome::from(self.resolve(ticket).await);
        info!(role = ?outcome.role, status = ?outcome.status, "Login finished");
        outcome
    }

    /// Creates an account. The profile is provisioned by the service and
    /// resolved once a session notification arrives.
    #[instrument(skip(self, password))]
    pub async fn sign_up(&self, email: &str, password: &SecretString) -> SignUpOutcome {
        match self.auth.sign_up(email, password).await {
            Ok(signup) => {
                info!(
                    user = %signup.identity.email,
                    session_issued = signup.session_issued,
                    "Account created"
                );
                SignUpOutcome {
                    session_issued: signup.session_issued,
                    error: None,
                }
            }
            Err(err) => {
                warn!("Sign-up failed: {}", err);
                SignUpOutcome {
                    session_issued: false,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Ends the session. Local state is cleared even when the service call fails.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        self.dispatch(AuthEvent::Submitting);
        if let Err(err) = self.auth.sign_out().await {
            warn!("Remote sign-out failed, clearing local state anyway: {}", err);
        }
        self.dispatch(AuthEvent::SignedOut);
    }

    fn on_session_event(self: Arc<Self>, event: SessionEvent) {
        match self.dispatch(AuthEvent::Notified(event)) {
            Applied::Resolving(ticket) => {
                debug!(user_id = %ticket.identity(), "Session notification, resolving profile");
                tokio::spawn(async move {
                    let _ = self.resolve(ticket).await;
                });
            }
            Applied::Changed => debug!("Session notification applied"),
            Applied::Discarded => debug!("Session notification ignored while bootstrapping"),
        }
    }

    async fn resolve(&self, ticket: Ticket) -> Result<Profile, ResolveError> {
        let outcome = self.resolver.resolve(ticket.identity()).await;
        if self.dispatch(AuthEvent::ProfileResolved {
            ticket,
            outcome: outcome.clone(),
        }) == Applied::Discarded
        {
            debug!("Discarded profile for a superseded session");
        }
        outcome
    }

    fn dispatch(&self, event: AuthEvent) -> Applied {
        let mut machine = self.lock();
        let applied = machine.apply(event);
        if applied != Applied::Discarded {
            self.state.send_replace(machine.state().clone());
        }
        applied
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Machine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
