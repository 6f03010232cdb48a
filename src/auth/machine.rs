//! Pure transition function behind the orchestrator. Every state change goes
//! through [`Machine::apply`], so stale resolutions are rejected in one place.

use super::{
    resolver::ResolveError,
    session::SessionStore,
    types::{AuthPhase, AuthState, Profile},
};
use crate::backend::{Session, SessionEvent};
use uuid::Uuid;

/// Tags one profile resolution. Only the newest ticket issued for the current
/// identity may write its outcome into the state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket {
    serial: u64,
    identity: Uuid,
}

impl Ticket {
    #[must_use]
    pub fn identity(&self) -> Uuid {
        self.identity
    }
}

#[derive(Debug)]
pub(crate) enum AuthEvent {
    Submitting,
    SignInRejected,
    /// `login` obtained a session from the service.
    SignedIn(Session),
    /// Notification published by the auth service. Ignored until bootstrap
    /// has settled, since the restore result already reflects it.
    Notified(SessionEvent),
    ProfileResolved {
        ticket: Ticket,
        outcome: Result<Profile, ResolveError>,
    },
    BootstrapSettled {
        restored: Option<(Session, Profile)>,
    },
    BootstrapFailed,
    SignedOut,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Applied {
    Changed,
    /// A resolution must be started for this ticket.
    Resolving(Ticket),
    Discarded,
}

#[derive(Debug)]
pub(crate) struct Machine {
    state: AuthState,
    session: SessionStore,
    serial: u64,
    resolving: Option<Ticket>,
    booted: bool,
}

impl Machine {
    pub(crate) fn new() -> Self {
        Self {
            state: AuthState::bootstrapping(),
            session: SessionStore::default(),
            serial: 0,
            resolving: None,
            booted: false,
        }
    }

    pub(crate) fn state(&self) -> &AuthState {
        &self.state
    }

    pub(crate) fn session(&self) -> &SessionStore {
        &self.session
    }

    pub(crate) fn apply(&mut self, event: AuthEvent) -> Applied {
        let applied = match event {
            AuthEvent::Submitting => {
                self.state.loading = true;
                Applied::Changed
            }
            AuthEvent::SignInRejected => {
                self.state.loading = self.resolving.is_some() || !self.booted;
                Applied::Changed
            }
            AuthEvent::SignedIn(session) => {
                self.booted = true;
                self.start_session(session, true)
            }
            AuthEvent::Notified(event) => {
                if !self.booted {
                    return Applied::Discarded;
                }
                match event {
                    // Echo of a sign-in already owned by a ticket.
                    SessionEvent::SignedIn(session) if self.is_current(&session) => {
                        self.session.replace(session);
                        Applied::Changed
                    }
                    SessionEvent::SignedIn(session) => self.start_session(session, true),
                    SessionEvent::TokenRefreshed(session) => self.start_session(session, false),
                    SessionEvent::SignedOut => {
                        self.clear();
                        Applied::Changed
                    }
                }
            }
            AuthEvent::ProfileResolved { ticket, outcome } => {
                if self.resolving != Some(ticket) {
                    return Applied::Discarded;
                }
                self.resolving = None;
                match outcome {
                    Ok(profile) => {
                        self.state.profile = Some(profile);
                        self.state.error = None;
                    }
                    Err(err) => {
                        self.state.profile = None;
                        self.state.error = Some(err.to_string());
                    }
                }
                self.state.loading = false;
                Applied::Changed
            }
            AuthEvent::BootstrapSettled { restored } => {
                if self.booted {
                    return Applied::Discarded;
                }
                self.booted = true;
                match restored {
                    Some((session, profile)) => {
                        self.state.identity = Some(session.identity.clone());
                        self.session.replace(session);
                        self.state.profile = Some(profile);
                        self.state.error = None;
                        self.state.loading = false;
                    }
                    None => self.clear(),
                }
                Applied::Changed
            }
            AuthEvent::BootstrapFailed => {
                if self.booted {
                    return Applied::Discarded;
                }
                self.booted = true;
                self.clear();
                Applied::Changed
            }
            AuthEvent::SignedOut => {
                self.booted = true;
                self.clear();
                Applied::Changed
            }
        };
        self.state.phase = self.phase();
        applied
    }

    fn is_current(&self, session: &Session) -> bool {
        self.state.identity.as_ref().map(|current| current.id) == Some(session.identity.id)
    }

    fn start_session(&mut self, session: Session, fresh_sign_in: bool) -> Applied {
        let identity = session.identity.clone();
        if !self.is_current(&session) {
            self.state.profile = None;
            self.state.error = None;
        }
        self.session.replace(session);
        self.state.identity = Some(identity.clone());

        self.serial += 1;
        let ticket = Ticket {
            serial: self.serial,
            identity: identity.id,
        };
        self.resolving = Some(ticket);
        // A token refresh for a known profile re-resolves in the background.
        if fresh_sign_in || self.state.profile.is_none() {
            self.state.loading = true;
        }
        Applied::Resolving(ticket)
    }

    fn clear(&mut self) {
        self.serial += 1;
        self.resolving = None;
        self.session.clear();
        self.state.identity = None;
        self.state.profile = None;
        self.state.error = None;
        self.state.loading = false;
    }

    fn phase(&self) -> AuthPhase {
        if !self.booted {
            AuthPhase::Bootstrapping
        } else if self.state.identity.is_none() {
            AuthPhase::Unauthenticated
        } else if self.state.profile.is_some() {
            AuthPhase::AuthenticatedReady
        } else if self.state.error.is_some() {
            AuthPhase::AuthenticatedError
        } else {
            AuthPhase::AuthenticatedResolving
        }
    }
}
