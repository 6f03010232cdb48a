//! Contract with the hosted auth + data service.
//!
//! The portal never stores data itself: sessions are issued by the service's
//! auth endpoints and every record lives in one of the named collections,
//! guarded server-side by row-level security. [`AuthService`] and
//! [`DataService`] are the only seams the rest of the crate depends on;
//! [`RestBackend`] implements both over HTTPS.

mod error;
#[cfg(test)]
pub(crate) mod memory;
mod rest;
mod store;

pub use error::BackendError;
pub use rest::RestBackend;
pub use store::SessionFile;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::broadcast;
use utoipa::ToSchema;
use uuid::Uuid;

/// Authenticated user, independent of any authorization role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

/// Token pair issued by the auth service for one login.
#[derive(Clone, Debug)]
pub struct Session {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub expires_at: DateTime<Utc>,
    pub identity: Identity,
}

impl Session {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Out-of-band session changes published by the auth service.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    SignedIn(Session),
    TokenRefreshed(Session),
    SignedOut,
}

/// Result of creating an account. Some deployments require email
/// confirmation, in which case no session is issued yet.
#[derive(Clone, Debug)]
pub struct SignUp {
    pub identity: Identity,
    pub session_issued: bool,
}

/// Collections exposed by the data service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Profiles,
    Scouts,
    Attendance,
    Progress,
    Announcements,
    Activities,
    GroupFinance,
}

impl Collection {
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Profiles => "profiles",
            Self::Scouts => "scouts",
            Self::Attendance => "attendance",
            Self::Progress => "progress",
            Self::Announcements => "announcements",
            Self::Activities => "activities",
            Self::GroupFinance => "group_finance",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
}

impl FilterOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Gte => "gte",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Row selection: conjunctive filters, optional ordering and limit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            op: FilterOp::Eq,
            value: value.to_string(),
        });
        self
    }

    #[must_use]
    pub fn gte(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            op: FilterOp::Gte,
            value: value.to_string(),
        });
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Returns the persisted session, refreshing it when the access token expired.
    async fn current_session(&self) -> Result<Option<Session>, BackendError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, BackendError>;

    async fn sign_up(&self, email: &str, password: &SecretString) -> Result<SignUp, BackendError>;

    /// Ends the session. The local session is dropped even when the remote
    /// call fails; the error is still reported.
    async fn sign_out(&self) -> Result<(), BackendError>;

    /// Subscribes to sign-in, token refresh and sign-out notifications.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}

#[async_trait]
pub trait DataService: Send + Sync {
    async fn select(&self, collection: Collection, query: &Query)
    -> Result<Vec<Value>, BackendError>;

    /// Inserts one record and returns the stored row.
    async fn insert(&self, collection: Collection, record: Value) -> Result<Value, BackendError>;

    async fn update(&self, collection: Collection, id: &str, patch: Value)
    -> Result<(), BackendError>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), BackendError>;
}

/// Selects rows and decodes them into `T`.
///
/// # Errors
/// Returns the service error, or `BackendError::Parse` when a row does not match `T`.
pub async fn select_as<T: DeserializeOwned>(
    data: &dyn DataService,
    collection: Collection,
    query: &Query,
) -> Result<Vec<T>, BackendError> {
    data.select(collection, query)
        .await?
        .into_iter()
        .map(decode)
        .collect()
}

/// Selects at most one row.
///
/// # Errors
/// Same as [`select_as`].
pub async fn select_one_as<T: DeserializeOwned>(
    data: &dyn DataService,
    collection: Collection,
    query: Query,
) -> Result<Option<T>, BackendError> {
    let query = query.with_limit(1);
    let mut rows = select_as(data, collection, &query).await?;
    Ok(if rows.is_empty() {
        None
    } else {
        Some(rows.swap_remove(0))
    })
}

/// Inserts `record` and decodes the stored row.
///
/// # Errors
/// Returns the service error, or a serialization/parse error.
pub async fn insert_as<T: DeserializeOwned, R: Serialize + Sync>(
    data: &dyn DataService,
    collection: Collection,
    record: &R,
) -> Result<T, BackendError> {
    let record = serde_json::to_value(record)
        .map_err(|err| BackendError::Serialization(format!("Failed to encode record: {err}")))?;
    decode(data.insert(collection, record).await?)
}

/// Encodes a patch for [`DataService::update`].
///
/// # Errors
/// Returns `BackendError::Serialization` when `patch` cannot be encoded.
pub fn to_patch<P: Serialize>(patch: &P) -> Result<Value, BackendError> {
    serde_json::to_value(patch)
        .map_err(|err| BackendError::Serialization(format!("Failed to encode patch: {err}")))
}

fn decode<T: DeserializeOwned>(row: Value) -> Result<T, BackendError> {
    serde_json::from_value(row)
        .map_err(|err| BackendError::Parse(format!("Failed to decode row: {err}")))
}
