pub mod admin;
pub mod dashboard;
pub mod health;
pub mod session;

// common functions for the handlers
use super::Portal;
use crate::{
    auth::{GuardDecision, Role, evaluate},
    backend::{BackendError, Identity},
    features::ScreenError,
};
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use regex::Regex;
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

pub(crate) const PENDING_APPROVAL_MESSAGE: &str =
    "Your account is waiting for approval by a group administrator.";

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// The route guard did not render.
    Guard(GuardDecision),
    Screen(ScreenError),
}

impl From<ScreenError> for ApiError {
    fn from(err: ScreenError) -> Self {
        Self::Screen(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Guard(decision) => guard_response(decision),
            Self::Screen(err) => {
                let status = match &err {
                    ScreenError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    ScreenError::Unauthenticated => StatusCode::UNAUTHORIZED,
                    ScreenError::Backend(BackendError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
                    ScreenError::Backend(BackendError::Http { status, .. })
                        if *status == 401 || *status == 403 =>
                    {
                        StatusCode::FORBIDDEN
                    }
                    ScreenError::Backend(_) => {
                        error!("Data service call failed: {}", err);
                        StatusCode::BAD_GATEWAY
                    }
                };
                (
                    status,
                    Json(ErrorBody {
                        error: err.to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

fn guard_response(decision: GuardDecision) -> Response {
    match decision {
        GuardDecision::Wait => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, HeaderValue::from_static("1"))],
            Json(GuardDecision::Wait),
        )
            .into_response(),
        GuardDecision::RedirectTo(location) => match HeaderValue::from_str(&location) {
            Ok(value) => (
                StatusCode::SEE_OTHER,
                [(header::LOCATION, value)],
                Json(GuardDecision::RedirectTo(location)),
            )
                .into_response(),
            Err(err) => {
                error!("Invalid redirect location {}: {}", location, err);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        GuardDecision::PendingApproval => (
            StatusCode::FORBIDDEN,
            Json(ErrorBody {
                error: PENDING_APPROVAL_MESSAGE.to_string(),
            }),
        )
            .into_response(),
        GuardDecision::Render => StatusCode::OK.into_response(),
    }
}

/// Runs the route guard for `allowed` and returns the acting identity when
/// the route renders.
pub(crate) fn authorize(portal: &Portal, allowed: &[Role]) -> Result<Identity, ApiError> {
    let state = portal.auth.state();
    match evaluate(&state, Some(allowed)) {
        GuardDecision::Render => state
            .identity
            .ok_or(ApiError::Screen(ScreenError::Unauthenticated)),
        decision => Err(ApiError::Guard(decision)),
    }
}

pub(crate) fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        api::{Portal, router},
        auth::{AuthConfig, AuthOrchestrator},
        backend::memory::MemoryBackend,
    };
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::Request,
    };
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    pub(crate) struct TestPortal {
        pub backend: Arc<MemoryBackend>,
        pub portal: Portal,
    }

    impl TestPortal {
        pub(crate) fn new() -> Self {
            let backend = Arc::new(MemoryBackend::new());
            let auth = AuthOrchestrator::new(backend.clone(), backend.clone(), AuthConfig::default());
            Self {
                portal: Portal {
                    auth,
                    data: backend.clone(),
                },
                backend,
            }
        }

        /// Bootstraps and signs in a user whose profile has `role` and `status`.
        pub(crate) async fn signed_in(role: &str, status: &str) -> Self {
            let portal = Self::new();
            let identity = portal.backend.add_account("user@example.org", "secret");
            portal.backend.add_profile(&identity, role, Some(status));
            portal.portal.auth.bootstrap().await;
            portal
                .portal
                .auth
                .login(
                    "user@example.org",
                    &secrecy::SecretString::from("secret".to_string()),
                )
                .await;
            portal
        }

        pub(crate) fn app(&self) -> Router {
            router(self.portal.clone())
        }
    }

    pub(crate) async fn send(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, body)
    }

    pub(crate) fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    pub(crate) fn json(method: &str, uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn test_valid_email() {
        assert!(valid_email("parent@example.org"));
        assert!(!valid_email("parent@"));
        assert!(!valid_email("parent example.org"));
    }

    #[tokio::test]
    async fn guard_decisions_map_to_responses() {
        let (status, headers, _) = send_decision(GuardDecision::Wait).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(headers.get(header::RETRY_AFTER).unwrap(), "1");

        let (status, headers, _) =
            send_decision(GuardDecision::RedirectTo("/login".to_string())).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(headers.get(header::LOCATION).unwrap(), "/login");

        let (status, _, body) = send_decision(GuardDecision::PendingApproval).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], PENDING_APPROVAL_MESSAGE);
    }

    async fn send_decision(decision: GuardDecision) -> (StatusCode, axum::http::HeaderMap, Value) {
        let response = ApiError::Guard(decision).into_response();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn screen_errors_map_to_statuses() {
        let invalid = ApiError::from(ScreenError::Invalid("Name is required.".to_string()));
        assert_eq!(invalid.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);

        let timeout = ApiError::from(ScreenError::Backend(BackendError::Timeout("slow".to_string())));
        assert_eq!(timeout.into_response().status(), StatusCode::GATEWAY_TIMEOUT);

        let denied = ApiError::from(ScreenError::Backend(BackendError::Http {
            status: 403,
            message: "row-level security".to_string(),
        }));
        assert_eq!(denied.into_response().status(), StatusCode::FORBIDDEN);
    }
}
