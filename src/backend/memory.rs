//! In-memory stand-in for the hosted service used by unit tests. Knobs let a
//! test delay or fail individual calls and make the profile row of an
//! identity appear only after a number of reads, mimicking the provisioning
//! trigger that runs after signup.

use super::{
    AuthService, BackendError, Collection, DataService, FilterOp, Identity, Query, Session,
    SessionEvent, SignUp,
};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    rows: HashMap<Collection, Vec<Value>>,
}

pub(crate) struct MemoryBackend {
    accounts: Mutex<HashMap<String, (String, Identity)>>,
    current: Mutex<Option<Session>>,
    stored: Mutex<Option<Session>>,
    tables: Mutex<Tables>,
    events: broadcast::Sender<SessionEvent>,
    /// Profile reads that still see no row before it becomes visible.
    hidden_profile_reads: AtomicUsize,
    profile_delay: Mutex<Option<Duration>>,
    session_delay: Mutex<Option<Duration>>,
    fail_sign_out: AtomicBool,
    fail_writes: AtomicBool,
    confirm_email: AtomicBool,
    pub(crate) profile_reads: AtomicUsize,
    pub(crate) sign_out_calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn session_for(identity: &Identity) -> Session {
    Session {
        access_token: SecretString::from(format!("access-{}", identity.id)),
        refresh_token: SecretString::from(format!("refresh-{}", identity.id)),
        expires_at: Utc::now() + ChronoDuration::hours(1),
        identity: identity.clone(),
    }
}

impl MemoryBackend {
    pub(crate) fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            accounts: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            stored: Mutex::new(None),
            tables: Mutex::new(Tables::default()),
            events,
            hidden_profile_reads: AtomicUsize::new(0),
            profile_delay: Mutex::new(None),
            session_delay: Mutex::new(None),
            fail_sign_out: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            confirm_email: AtomicBool::new(false),
            profile_reads: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
        }
    }

    /// Registers an account and returns its identity.
    pub(crate) fn add_account(&self, email: &str, password: &str) -> Identity {
        let identity = Identity {
            id: Uuid::new_v4(),
            email: email.to_string(),
        };
        lock(&self.accounts).insert(
            email.to_string(),
            (password.to_string(), identity.clone()),
        );
        identity
    }

    pub(crate) fn add_profile(&self, identity: &Identity, role: &str, status: Option<&str>) {
        let mut row = json!({
            "id": identity.id,
            "email": identity.email,
            "role": role,
            "updated_at": Utc::now(),
        });
        if let Some(status) = status {
            row["status"] = json!(status);
        }
        self.seed(Collection::Profiles, row);
    }

    pub(crate) fn seed(&self, collection: Collection, row: Value) {
        lock(&self.tables)
            .rows
            .entry(collection)
            .or_default()
            .push(row);
    }

    pub(crate) fn rows(&self, collection: Collection) -> Vec<Value> {
        lock(&self.tables)
            .rows
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Persists a session that `current_session` will restore.
    pub(crate) fn store_session(&self, session: Session) {
        *lock(&self.stored) = Some(session);
    }

    pub(crate) fn current(&self) -> Option<Session> {
        lock(&self.current).clone()
    }

    pub(crate) fn hide_profile_for_reads(&self, reads: usize) {
        self.hidden_profile_reads.store(reads, Ordering::SeqCst);
    }

    pub(crate) fn delay_profiles(&self, delay: Duration) {
        *lock(&self.profile_delay) = Some(delay);
    }

    pub(crate) fn delay_session_restore(&self, delay: Duration) {
        *lock(&self.session_delay) = Some(delay);
    }

    pub(crate) fn fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn require_email_confirmation(&self, required: bool) {
        self.confirm_email.store(required, Ordering::SeqCst);
    }

    /// Publishes a notification as if it came from the service.
    pub(crate) fn notify(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn check_writes(&self) -> Result<(), BackendError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(BackendError::Http {
                status: 503,
                message: "write rejected".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

fn matches(row: &Value, query: &Query) -> bool {
    query.filters.iter().all(|filter| {
        let cell = row.get(&filter.column).map(cell_text);
        match (filter.op, cell) {
            (FilterOp::Eq, Some(cell)) => cell == filter.value,
            (FilterOp::Gte, Some(cell)) => cell >= filter.value,
            (_, None) => false,
        }
    })
}

#[async_trait]
impl AuthService for MemoryBackend {
    async fn current_session(&self) -> Result<Option<Session>, BackendError> {
        let delay = *lock(&self.session_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let stored = lock(&self.stored).clone();
        if let Some(session) = &stored {
            *lock(&self.current) = Some(session.clone());
        }
        Ok(stored)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, BackendError> {
        let account = lock(&self.accounts).get(email).cloned();
        match account {
            Some((expected, identity)) if expected == password.expose_secret() => {
                let session = session_for(&identity);
                *lock(&self.current) = Some(session.clone());
                let _ = self.events.send(SessionEvent::SignedIn(session.clone()));
                Ok(session)
            }
            _ => Err(BackendError::Rejected(
                "Invalid login credentials".to_string(),
            )),
        }
    }

    async fn sign_up(&self, email: &str, password: &SecretString) -> Result<SignUp, BackendError> {
        if lock(&self.accounts).contains_key(email) {
            return Err(BackendError::Rejected("User already registered".to_string()));
        }
        let identity = self.add_account(email, password.expose_secret());
        if self.confirm_email.load(Ordering::SeqCst) {
            return Ok(SignUp {
                identity,
                session_issued: false,
            });
        }
        let session = session_for(&identity);
        *lock(&self.current) = Some(session.clone());
        let _ = self.events.send(SessionEvent::SignedIn(session));
        Ok(SignUp {
            identity,
            session_issued: true,
        })
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.current) = None;
        *lock(&self.stored) = None;
        let _ = self.events.send(SessionEvent::SignedOut);
        if self.fail_sign_out.load(Ordering::SeqCst) {
            Err(BackendError::Network("connection reset".to_string()))
        } else {
            Ok(())
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl DataService for MemoryBackend {
    async fn select(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<Value>, BackendError> {
        if collection == Collection::Profiles {
            self.profile_reads.fetch_add(1, Ordering::SeqCst);
            let delay = *lock(&self.profile_delay);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let hidden = self
                .hidden_profile_reads
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if hidden.is_ok() {
                return Ok(Vec::new());
            }
        }

        let mut rows: Vec<Value> = self
            .rows(collection)
            .into_iter()
            .filter(|row| matches(row, query))
            .collect();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let left = a.get(&order.column).map(cell_text).unwrap_or_default();
                let right = b.get(&order.column).map(cell_text).unwrap_or_default();
                if order.ascending {
                    left.cmp(&right)
                } else {
                    right.cmp(&left)
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, collection: Collection, record: Value) -> Result<Value, BackendError> {
        self.check_writes()?;
        let mut row = record;
        if row.get("id").is_none() {
            row["id"] = json!(Uuid::new_v4());
        }
        if row.get("created_at").is_none() {
            row["created_at"] = json!(Utc::now());
        }
        if collection != Collection::GroupFinance && row.get("updated_at").is_none() {
            row["updated_at"] = json!(Utc::now());
        }
        if collection == Collection::GroupFinance && row.get("last_updated_at").is_none() {
            row["last_updated_at"] = json!(Utc::now());
        }
        self.seed(collection, row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Value,
    ) -> Result<(), BackendError> {
        self.check_writes()?;
        let mut tables = lock(&self.tables);
        let rows = tables.rows.entry(collection).or_default();
        for row in rows.iter_mut() {
            if row.get("id").map(cell_text).as_deref() == Some(id) {
                if let (Some(target), Some(changes)) = (row.as_object_mut(), patch.as_object()) {
                    for (key, value) in changes {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), BackendError> {
        self.check_writes()?;
        let mut tables = lock(&self.tables);
        if let Some(rows) = tables.rows.get_mut(&collection) {
            rows.retain(|row| row.get("id").map(cell_text).as_deref() != Some(id));
        }
        Ok(())
    }
}
