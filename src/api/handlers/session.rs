use super::{ErrorBody, valid_email};
use crate::{
    api::Portal,
    auth::{AuthState, GuardDecision, LoginOutcome, SignUpOutcome, navigate as guard_navigate},
};
use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use secrecy::SecretString;
use serde::Deserialize;
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct Credentials {
    email: String,
    #[schema(value_type = String, format = Password)]
    password: SecretString,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct NavigateParams {
    /// Portal route, e.g. `/admin`.
    path: String,
}

fn invalid_email() -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: "Invalid email address.".to_string(),
        }),
    )
}

#[utoipa::path(
    get,
    path = "/v1/session",
    responses(
        (status = 200, description = "Current authentication state", body = AuthState)
    ),
    tag = "session"
)]
pub async fn current(portal: Extension<Portal>) -> Json<AuthState> {
    Json(portal.auth.state())
}

#[utoipa::path(
    post,
    path = "/v1/session/login",
    request_body = Credentials,
    responses(
        (status = 200, description = "Signed in, profile resolved", body = LoginOutcome),
        (status = 400, description = "Malformed email", body = ErrorBody),
        (status = 401, description = "Credentials rejected or profile unavailable", body = LoginOutcome)
    ),
    tag = "session"
)]
#[instrument(skip(portal))]
pub async fn login(portal: Extension<Portal>, Json(credentials): Json<Credentials>) -> impl IntoResponse {
    let email = credentials.email.trim();
    if !valid_email(email) {
        return invalid_email().into_response();
    }

    let outcome = portal.auth.login(email, &credentials.password).await;
    let status = if outcome.error.is_none() {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    };
    (status, Json(outcome)).into_response()
}

#[utoipa::path(
    post,
    path = "/v1/session/signup",
    request_body = Credentials,
    responses(
        (status = 201, description = "Account created", body = SignUpOutcome),
        (status = 400, description = "Malformed email or rejected by the service", body = SignUpOutcome)
    ),
    tag = "session"
)]
#[instrument(skip(portal))]
pub async fn sign_up(portal: Extension<Portal>, Json(credentials): Json<Credentials>) -> impl IntoResponse {
    let email = credentials.email.trim();
    if !valid_email(email) {
        return invalid_email().into_response();
    }

    let outcome = portal.auth.sign_up(email, &credentials.password).await;
    let status = if outcome.error.is_none() {
        StatusCode::CREATED
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(outcome)).into_response()
}

#[utoipa::path(
    post,
    path = "/v1/session/logout",
    responses(
        (status = 204, description = "Signed out")
    ),
    tag = "session"
)]
pub async fn logout(portal: Extension<Portal>) -> StatusCode {
    portal.auth.logout().await;
    StatusCode::NO_CONTENT
}

#[utoipa::path(
    get,
    path = "/v1/navigate",
    params(NavigateParams),
    responses(
        (status = 200, description = "Route guard decision for the path", body = GuardDecision)
    ),
    tag = "session"
)]
pub async fn navigate(portal: Extension<Portal>, Query(params): Query<NavigateParams>) -> Json<GuardDecision> {
    Json(guard_navigate(&portal.auth.state(), &params.path))
}
