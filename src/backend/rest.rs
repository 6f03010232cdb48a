//! HTTP implementation of the service contract: auth endpoints under
//! `/auth/v1` and collections under `/rest/v1`. Every request carries the
//! public API key; data requests use the session token as bearer when a
//! session exists so row-level security applies to the signed-in identity.

use super::{
    AuthService, BackendError, Collection, DataService, Identity, Query, Session, SessionEvent,
    SessionFile, SignUp,
    error::{map_request_error, sanitize_body},
};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use std::{
    sync::{PoisonError, RwLock},
    time::Duration,
};
use tokio::sync::broadcast;
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

/// Default request timeout applied to every call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Capacity of the session change channel.
const EVENT_CAPACITY: usize = 16;

#[derive(Deserialize)]
struct UserResponse {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserResponse,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|epoch| DateTime::from_timestamp(epoch, 0))
            .unwrap_or_else(|| now + ChronoDuration::seconds(self.expires_in));

        Session {
            access_token: SecretString::from(self.access_token),
            refresh_token: SecretString::from(self.refresh_token),
            expires_at,
            identity: Identity {
                id: self.user.id,
                email: self.user.email.unwrap_or_default(),
            },
        }
    }
}

pub struct RestBackend {
    client: Client,
    base_url: Url,
    anon_key: SecretString,
    session: RwLock<Option<Session>>,
    session_file: Option<SessionFile>,
    events: broadcast::Sender<SessionEvent>,
}

impl std::fmt::Debug for RestBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBackend")
            .field("base_url", &self.base_url.as_str())
            .field("anon_key", &"***")
            .field("session_file", &self.session_file)
            .finish_non_exhaustive()
    }
}

impl RestBackend {
    /// Builds a client for the service rooted at `base_url`.
    ///
    /// # Errors
    /// Returns `BackendError::Config` if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, anon_key: SecretString) -> Result<Self, BackendError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|err| BackendError::Config(format!("Invalid service URL {base_url}: {err}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| BackendError::Config(format!("Failed to build HTTP client: {err}")))?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            client,
            base_url,
            anon_key,
            session: RwLock::new(None),
            session_file: None,
            events,
        })
    }

    /// Persists sessions to `file` so they survive a restart.
    #[must_use]
    pub fn with_session_file(mut self, file: SessionFile) -> Self {
        self.session_file = Some(file);
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path)
            .map_err(|err| BackendError::Config(format!("Invalid endpoint {path}: {err}")))
    }

    fn snapshot(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_session(&self, session: Option<Session>) -> Option<Session> {
        let mut guard = self.session.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, session)
    }

    fn bearer(&self) -> String {
        self.snapshot().map_or_else(
            || self.anon_key.expose_secret().to_string(),
            |session| session.access_token.expose_secret().to_string(),
        )
    }

    fn with_keys(&self, builder: RequestBuilder, bearer: &str) -> RequestBuilder {
        builder
            .header("apikey", self.anon_key.expose_secret())
            .bearer_auth(bearer)
    }

    async fn send(builder: RequestBuilder) -> Result<Response, BackendError> {
        builder.send().await.map_err(|err| map_request_error(&err))
    }

    /// Stores the session locally, persists it and notifies subscribers.
    async fn install(&self, session: Session, event: fn(Session) -> SessionEvent) {
        self.replace_session(Some(session.clone()));
        if let Some(file) = &self.session_file {
            if let Err(err) = file.save(&session).await {
                warn!("Failed to persist session: {}", err);
            }
        }
        let _ = self.events.send(event(session));
    }

    async fn drop_session(&self) -> Option<Session> {
        let previous = self.replace_session(None);
        if let Some(file) = &self.session_file {
            if let Err(err) = file.clear().await {
                warn!("Failed to remove persisted session: {}", err);
            }
        }
        let _ = self.events.send(SessionEvent::SignedOut);
        previous
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<Session, BackendError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let anon = self.anon_key.expose_secret().to_string();
        let response = Self::send(self.with_keys(self.client.post(url), &anon).json(&body)).await?;
        let token: TokenResponse = auth_json(response).await?;
        Ok(token.into_session(Utc::now()))
    }

    #[instrument(skip(self, session), fields(user_id = %session.identity.id))]
    async fn refresh(&self, session: &Session) -> Result<Session, BackendError> {
        self.token_grant(
            "refresh_token",
            json!({ "refresh_token": session.refresh_token.expose_secret() }),
        )
        .await
    }
}

#[async_trait]
impl AuthService for RestBackend {
    async fn current_session(&self) -> Result<Option<Session>, BackendError> {
        let session = match self.snapshot() {
            Some(session) => Some(session),
            None => match &self.session_file {
                Some(file) => match file.load().await {
                    Ok(stored) => stored,
                    Err(err) => {
                        warn!("Ignoring unreadable session file: {}", err);
                        None
                    }
                },
                None => None,
            },
        };

        let Some(session) = session else {
            return Ok(None);
        };

        if !session.is_expired(Utc::now()) {
            self.replace_session(Some(session.clone()));
            return Ok(Some(session));
        }

        debug!("Access token expired, refreshing");
        match self.refresh(&session).await {
            Ok(refreshed) => {
                self.install(refreshed.clone(), SessionEvent::TokenRefreshed)
                    .await;
                Ok(Some(refreshed))
            }
            Err(BackendError::Rejected(message)) => {
                warn!("Refresh token rejected: {}", message);
                self.drop_session().await;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    #[instrument(skip(self, password))]
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, BackendError> {
        let session = self
            .token_grant(
                "password",
                json!({ "email": email, "password": password.expose_secret() }),
            )
            .await?;
        self.install(session.clone(), SessionEvent::SignedIn).await;
        Ok(session)
    }

    #[instrument(skip(self, password))]
    async fn sign_up(&self, email: &str, password: &SecretString) -> Result<SignUp, BackendError> {
        let url = self.endpoint("auth/v1/signup")?;
        let anon = self.anon_key.expose_secret().to_string();
        let body = json!({ "email": email, "password": password.expose_secret() });
        let response = Self::send(self.with_keys(self.client.post(url), &anon).json(&body)).await?;
        let payload: Value = auth_json(response).await?;

        if payload.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(payload)
                .map_err(|err| BackendError::Parse(format!("Failed to decode session: {err}")))?;
            let session = token.into_session(Utc::now());
            let identity = session.identity.clone();
            self.install(session, SessionEvent::SignedIn).await;
            return Ok(SignUp {
                identity,
                session_issued: true,
            });
        }

        // Email confirmation pending: the service only returns the user.
        let user: UserResponse = serde_json::from_value(payload)
            .map_err(|err| BackendError::Parse(format!("Failed to decode user: {err}")))?;
        Ok(SignUp {
            identity: Identity {
                id: user.id,
                email: user.email.unwrap_or_else(|| email.to_string()),
            },
            session_issued: false,
        })
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let Some(previous) = self.drop_session().await else {
            return Ok(());
        };

        let url = self.endpoint("auth/v1/logout")?;
        let token = previous.access_token.expose_secret().to_string();
        let response = Self::send(self.with_keys(self.client.post(url), &token)).await?;
        empty_or_error(response).await
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl DataService for RestBackend {
    #[instrument(skip(self, query), fields(table = collection.table()))]
    async fn select(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<Value>, BackendError> {
        let url = collection_url(&self.base_url, collection, query)?;
        let response = Self::send(self.with_keys(self.client.get(url), &self.bearer())).await?;
        json_or_error(response).await
    }

    #[instrument(skip(self, record), fields(table = collection.table()))]
    async fn insert(&self, collection: Collection, record: Value) -> Result<Value, BackendError> {
        let url = collection_url(&self.base_url, collection, &Query::new())?;
        let builder = self
            .with_keys(self.client.post(url), &self.bearer())
            .header("Prefer", "return=representation")
            .json(&record);
        let response = Self::send(builder).await?;
        let rows: Vec<Value> = json_or_error(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::Parse("Insert returned no rows".to_string()))
    }

    #[instrument(skip(self, patch), fields(table = collection.table()))]
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Value,
    ) -> Result<(), BackendError> {
        let url = collection_url(&self.base_url, collection, &Query::new().eq("id", id))?;
        let builder = self
            .with_keys(self.client.patch(url), &self.bearer())
            .json(&patch);
        empty_or_error(Self::send(builder).await?).await
    }

    #[instrument(skip(self), fields(table = collection.table()))]
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), BackendError> {
        let url = collection_url(&self.base_url, collection, &Query::new().eq("id", id))?;
        let builder = self.with_keys(self.client.delete(url), &self.bearer());
        empty_or_error(Self::send(builder).await?).await
    }
}

/// Builds `/rest/v1/{table}` with `select`, filter, `order` and `limit` parameters.
fn collection_url(base: &Url, collection: Collection, query: &Query) -> Result<Url, BackendError> {
    let mut url = base
        .join(&format!("rest/v1/{}", collection.table()))
        .map_err(|err| BackendError::Config(format!("Invalid collection URL: {err}")))?;

    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("select", "*");
        for filter in &query.filters {
            pairs.append_pair(
                &filter.column,
                &format!("{}.{}", filter.op.as_str(), filter.value),
            );
        }
        if let Some(order) = &query.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            pairs.append_pair("order", &format!("{}.{direction}", order.column));
        }
        if let Some(limit) = query.limit {
            pairs.append_pair("limit", &limit.to_string());
        }
    }

    Ok(url)
}

/// Extracts the human-readable message from an auth error payload.
fn auth_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|payload| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|key| payload.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| sanitize_body(body))
}

/// Decodes an auth response; 400/401/422 are credential rejections.
async fn auth_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|err| BackendError::Parse(format!("Failed to decode response: {err}")));
    }

    let body = response.text().await.unwrap_or_default();
    if matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::UNPROCESSABLE_ENTITY
    ) {
        Err(BackendError::Rejected(auth_error_message(&body)))
    } else {
        Err(BackendError::Http {
            status: status.as_u16(),
            message: sanitize_body(&body),
        })
    }
}

async fn json_or_error<T: serde::de::DeserializeOwned>(
    response: Response,
) -> Result<T, BackendError> {
    if response.status().is_success() {
        response
            .json::<T>()
            .await
            .map_err(|err| BackendError::Parse(format!("Failed to decode response: {err}")))
    } else {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Http {
            status,
            message: sanitize_body(&body),
        })
    }
}

async fn empty_or_error(response: Response) -> Result<(), BackendError> {
    if response.status().is_success() {
        Ok(())
    } else {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Http {
            status,
            message: sanitize_body(&body),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::Query as AxumQuery,
        http::{HeaderMap, StatusCode as AxumStatus},
        response::IntoResponse,
        routing::{get, post},
    };
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    const USER_ID: &str = "6f1c2f4e-3c1d-4b7a-9a55-0d7f7d1b2c3e";

    async fn token(
        AxumQuery(params): AxumQuery<HashMap<String, String>>,
        Json(body): Json<Value>,
    ) -> impl IntoResponse {
        let grant = params.get("grant_type").cloned().unwrap_or_default();
        if grant == "password" && body["password"] == "correct horse" {
            return (
                AxumStatus::OK,
                Json(json!({
                    "access_token": "access-1",
                    "refresh_token": "refresh-1",
                    "expires_in": 3600,
                    "user": { "id": USER_ID, "email": body["email"] }
                })),
            );
        }
        (
            AxumStatus::BAD_REQUEST,
            Json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })),
        )
    }

    async fn scouts(
        headers: HeaderMap,
        AxumQuery(params): AxumQuery<HashMap<String, String>>,
    ) -> impl IntoResponse {
        let bearer = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let apikey = headers
            .get("apikey")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Json(json!([{
            "bearer": bearer,
            "apikey": apikey,
            "section": params.get("section"),
            "order": params.get("order"),
        }]))
    }

    async fn spawn_service() -> String {
        let app = Router::new()
            .route("/auth/v1/token", post(token))
            .route("/rest/v1/scouts", get(scouts));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    #[test]
    fn collection_url_encodes_filters_order_and_limit() {
        let base = Url::parse("https://project.example.co/").unwrap();
        let query = Query::new()
            .eq("section", "tropa")
            .gte("date", "2024-05-01T00:00:00Z")
            .order_by("full_name", true)
            .with_limit(1);
        let url = collection_url(&base, Collection::Scouts, &query).unwrap();

        assert_eq!(url.path(), "/rest/v1/scouts");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("select".to_string(), "*".to_string()),
                ("section".to_string(), "eq.tropa".to_string()),
                ("date".to_string(), "gte.2024-05-01T00:00:00Z".to_string()),
                ("order".to_string(), "full_name.asc".to_string()),
                ("limit".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn base_url_without_trailing_slash_keeps_its_path() {
        let backend =
            RestBackend::new("https://proxy.example.org/hosted", SecretString::from("k".to_string()))
                .unwrap();
        let url = backend.endpoint("auth/v1/signup").unwrap();
        assert_eq!(url.as_str(), "https://proxy.example.org/hosted/auth/v1/signup");
    }

    #[test]
    fn auth_error_message_prefers_description() {
        assert_eq!(
            auth_error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(auth_error_message(r#"{"msg":"User already registered"}"#), "User already registered");
        assert_eq!(auth_error_message("plain failure"), "plain failure");
    }

    #[test]
    fn token_response_prefers_absolute_expiry() {
        let now = Utc::now();
        let token: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "expires_at": 1_900_000_000,
            "user": { "id": USER_ID, "email": "leader@example.org" }
        }))
        .unwrap();
        let session = token.into_session(now);
        assert_eq!(session.expires_at.timestamp(), 1_900_000_000);
        assert_eq!(session.identity.email, "leader@example.org");
    }

    #[tokio::test]
    async fn sign_in_installs_session_and_notifies() {
        let base = spawn_service().await;
        let backend = RestBackend::new(&base, SecretString::from("anon".to_string())).unwrap();
        let mut events = backend.subscribe();

        let session = backend
            .sign_in_with_password(
                "leader@example.org",
                &SecretString::from("correct horse".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(session.identity.id.to_string(), USER_ID);
        assert!(matches!(events.recv().await, Ok(SessionEvent::SignedIn(_))));

        let current = backend.current_session().await.unwrap();
        assert_eq!(current.map(|s| s.identity.id), Some(session.identity.id));
    }

    #[tokio::test]
    async fn bad_credentials_are_rejected() {
        let base = spawn_service().await;
        let backend = RestBackend::new(&base, SecretString::from("anon".to_string())).unwrap();

        let result = backend
            .sign_in_with_password("leader@example.org", &SecretString::from("nope".to_string()))
            .await;
        assert_eq!(
            result.err(),
            Some(BackendError::Rejected("Invalid login credentials".to_string()))
        );
        assert!(backend.current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn data_requests_use_session_token_as_bearer() {
        let base = spawn_service().await;
        let backend = RestBackend::new(&base, SecretString::from("anon".to_string())).unwrap();

        let query = Query::new().eq("section", "manada").order_by("full_name", true);
        let rows = backend.select(Collection::Scouts, &query).await.unwrap();
        assert_eq!(rows[0]["bearer"], "Bearer anon");
        assert_eq!(rows[0]["apikey"], "anon");
        assert_eq!(rows[0]["section"], "eq.manada");
        assert_eq!(rows[0]["order"], "full_name.asc");

        backend
            .sign_in_with_password(
                "leader@example.org",
                &SecretString::from("correct horse".to_string()),
            )
            .await
            .unwrap();
        let rows = backend.select(Collection::Scouts, &query).await.unwrap();
        assert_eq!(rows[0]["bearer"], "Bearer access-1");
    }
}
