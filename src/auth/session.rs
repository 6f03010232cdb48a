use crate::backend::{Identity, Session};
use chrono::{DateTime, Utc};
use secrecy::SecretString;

/// Current identity and raw session token. Owned by the orchestrator's state
/// machine; everything else only sees the identity through `AuthState`.
#[derive(Default)]
pub struct SessionStore {
    current: Option<Session>,
}

impl SessionStore {
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.current.as_ref().map(|session| &session.identity)
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&SecretString> {
        self.current.as_ref().map(|session| &session.access_token)
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.current.as_ref().map(|session| session.expires_at)
    }

    pub(crate) fn replace(&mut self, session: Session) {
        self.current = Some(session);
    }

    pub(crate) fn clear(&mut self) {
        self.current = None;
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("identity", &self.identity())
            .field("access_token", &self.current.as_ref().map(|_| "***"))
            .field("expires_at", &self.expires_at())
            .finish()
    }
}
