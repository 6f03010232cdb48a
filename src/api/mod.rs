//! HTTP surface of the portal.

use crate::{auth::AuthOrchestrator, backend::DataService};
use anyhow::Result;
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, error, info, info_span};
use ulid::Ulid;

pub(crate) mod handlers;
mod openapi;

pub use openapi::openapi;

use handlers::{admin, dashboard, health, session};

/// Everything a request handler needs: the auth state owner and the data facade.
#[derive(Clone)]
pub struct Portal {
    pub auth: Arc<AuthOrchestrator>,
    pub data: Arc<dyn DataService>,
}

impl std::fmt::Debug for Portal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Portal")
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

/// Build the portal router.
#[must_use]
pub fn router(portal: Portal) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/openapi.json", get(openapi::document))
        .route("/v1/session", get(session::current))
        .route("/v1/session/login", post(session::login))
        .route("/v1/session/signup", post(session::sign_up))
        .route("/v1/session/logout", post(session::logout))
        .route("/v1/navigate", get(session::navigate))
        .route(
            "/v1/dashboard/scouts",
            get(dashboard::list_scouts).post(dashboard::create_scout),
        )
        .route(
            "/v1/dashboard/scouts/:id",
            put(dashboard::update_scout).delete(dashboard::delete_scout),
        )
        .route("/v1/dashboard/announcements", get(dashboard::announcements))
        .route("/v1/dashboard/activities", get(dashboard::activities))
        .route(
            "/v1/admin/sections/:section/scouts",
            get(admin::section_scouts),
        )
        .route("/v1/admin/scouts/:id", put(admin::update_scout))
        .route(
            "/v1/admin/sections/:section/attendance",
            get(admin::attendance_sheet),
        )
        .route(
            "/v1/admin/sections/:section/attendance/:scout_id",
            post(admin::toggle_attendance),
        )
        .route("/v1/admin/sections/:section/stages", get(admin::stages))
        .route(
            "/v1/admin/scouts/:id/progress",
            get(admin::progress_board).put(admin::set_progress),
        )
        .route(
            "/v1/admin/scouts/:id/specialties",
            post(admin::add_specialty),
        )
        .route(
            "/v1/admin/announcements",
            get(admin::announcements).post(admin::publish_announcement),
        )
        .route(
            "/v1/admin/announcements/:id",
            delete(admin::delete_announcement),
        )
        .route(
            "/v1/admin/activities",
            get(admin::activities).post(admin::schedule_activity),
        )
        .route(
            "/v1/admin/activities/:id",
            delete(admin::delete_activity),
        )
        .route(
            "/v1/admin/finance",
            get(admin::finance).put(admin::set_balance),
        )
        .route("/v1/admin/approvals", get(admin::pending_approvals))
        .route("/v1/admin/approvals/:id", post(admin::approve))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(portal)),
        )
}

/// Serve the portal until ctrl-c.
/// # Errors
/// Return error if the listener cannot be bound or the server fails
pub async fn serve(port: u16, portal: Portal) -> Result<()> {
    let app = router(portal);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Gracefully shutdown"),
        Err(err) => {
            error!("Failed to listen for ctrl-c: {}", err);
            std::future::pending::<()>().await;
        }
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
