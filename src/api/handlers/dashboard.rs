//! Parent dashboard: the family's scouts plus the group's news and calendar.

use super::{ApiError, ErrorBody, authorize};
use crate::{
    api::Portal,
    auth::Role,
    features::{
        activities::{self, Activity},
        announcements::{self, Announcement},
        scouts::{self, Scout, ScoutDraft},
    },
};
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

const PARENT: &[Role] = &[Role::Parent];

#[utoipa::path(
    get,
    path = "/v1/dashboard/scouts",
    responses(
        (status = 200, description = "Scouts registered by the signed-in parent", body = [Scout]),
        (status = 303, description = "Redirected by the route guard"),
        (status = 403, description = "Account pending approval", body = ErrorBody)
    ),
    tag = "dashboard"
)]
pub async fn list_scouts(portal: Extension<Portal>) -> Result<Json<Vec<Scout>>, ApiError> {
    let parent = authorize(&portal, PARENT)?;
    Ok(Json(scouts::list_mine(portal.data.as_ref(), &parent).await?))
}

#[utoipa::path(
    post,
    path = "/v1/dashboard/scouts",
    request_body = ScoutDraft,
    responses(
        (status = 201, description = "Scout registered", body = Scout),
        (status = 422, description = "Missing field", body = ErrorBody)
    ),
    tag = "dashboard"
)]
#[instrument(skip(portal, draft))]
pub async fn create_scout(
    portal: Extension<Portal>,
    Json(draft): Json<ScoutDraft>,
) -> Result<(StatusCode, Json<Scout>), ApiError> {
    let parent = authorize(&portal, PARENT)?;
    let scout = scouts::create(portal.data.as_ref(), &parent, &draft).await?;
    Ok((StatusCode::CREATED, Json(scout)))
}

#[utoipa::path(
    put,
    path = "/v1/dashboard/scouts/{id}",
    params(("id" = Uuid, Path, description = "Scout id")),
    request_body = ScoutDraft,
    responses(
        (status = 204, description = "Scout updated"),
        (status = 422, description = "Missing field", body = ErrorBody)
    ),
    tag = "dashboard"
)]
pub async fn update_scout(
    portal: Extension<Portal>,
    Path(id): Path<Uuid>,
    Json(draft): Json<ScoutDraft>,
) -> Result<StatusCode, ApiError> {
    authorize(&portal, PARENT)?;
    scouts::update(portal.data.as_ref(), id, &draft).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/v1/dashboard/scouts/{id}",
    params(("id" = Uuid, Path, description = "Scout id")),
    responses(
        (status = 204, description = "Scout removed")
    ),
    tag = "dashboard"
)]
pub async fn delete_scout(
    portal: Extension<Portal>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    authorize(&portal, PARENT)?;
    scouts::remove(portal.data.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/dashboard/announcements",
    responses(
        (status = 200, description = "Announcements, newest first", body = [Announcement])
    ),
    tag = "dashboard"
)]
pub async fn announcements(portal: Extension<Portal>) -> Result<Json<Vec<Announcement>>, ApiError> {
    authorize(&portal, PARENT)?;
    Ok(Json(announcements::list(portal.data.as_ref()).await?))
}

#[utoipa::path(
    get,
    path = "/v1/dashboard/activities",
    responses(
        (status = 200, description = "Activities that have not started yet", body = [Activity])
    ),
    tag = "dashboard"
)]
pub async fn activities(portal: Extension<Portal>) -> Result<Json<Vec<Activity>>, ApiError> {
    authorize(&portal, PARENT)?;
    Ok(Json(
        activities::upcoming(portal.data.as_ref(), Utc::now()).await?,
    ))
}
