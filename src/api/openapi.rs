use super::handlers::{admin, dashboard, health, session};
use axum::Json;
use utoipa::{
    OpenApi,
    openapi::{Contact, InfoBuilder, License},
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        session::current,
        session::login,
        session::sign_up,
        session::logout,
        session::navigate,
        dashboard::list_scouts,
        dashboard::create_scout,
        dashboard::update_scout,
        dashboard::delete_scout,
        dashboard::announcements,
        dashboard::activities,
        admin::section_scouts,
        admin::update_scout,
        admin::attendance_sheet,
        admin::toggle_attendance,
        admin::stages,
        admin::progress_board,
        admin::set_progress,
        admin::add_specialty,
        admin::announcements,
        admin::publish_announcement,
        admin::delete_announcement,
        admin::activities,
        admin::schedule_activity,
        admin::delete_activity,
        admin::finance,
        admin::set_balance,
        admin::pending_approvals,
        admin::approve,
    ),
    tags(
        (name = "health", description = "Liveness and build information"),
        (name = "session", description = "Sign in, sign up and route guard decisions"),
        (name = "dashboard", description = "Parent dashboard"),
        (name = "admin", description = "Group administration")
    )
)]
struct PortalApi;

/// `OpenAPI` document of every route the portal serves.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = PortalApi::openapi();
    // Use Cargo.toml metadata instead of the derive defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();
    info.contact = cargo_contact();
    info.license = cargo_license();
    doc.info = info;
    doc
}

pub(crate) async fn document() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi())
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    non_empty(value)
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|value| !value.is_empty())
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => (non_empty(name), non_empty(email.trim_end_matches('>'))),
        None => (non_empty(author), None),
    }
}
