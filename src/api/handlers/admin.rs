//! Administrator screens. Every handler runs the route guard for `admin` first.

use super::{ApiError, ErrorBody, authorize};
use crate::{
    api::Portal,
    auth::Role,
    features::{
        activities::{self, Activity, ActivityDraft},
        announcements::{self, Announcement, AnnouncementDraft},
        approvals::{self, PendingProfile},
        attendance::{AttendanceEntry, AttendanceSheet},
        finance::{self, GroupFinance},
        progress::{Percentage, Progress, ProgressBoard, ProgressKind, stage_levels},
        scouts::{self, Scout, ScoutDraft, Section},
    },
};
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

const ADMIN: &[Role] = &[Role::Admin];

#[derive(Debug, Deserialize, IntoParams)]
pub struct SheetParams {
    /// Roll call date, today (UTC) when omitted.
    date: Option<NaiveDate>,
}

impl SheetParams {
    fn date(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| Utc::now().date_naive())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttendanceView {
    section: Section,
    date: NaiveDate,
    entries: Vec<AttendanceEntry>,
}

impl From<&AttendanceSheet> for AttendanceView {
    fn from(sheet: &AttendanceSheet) -> Self {
        Self {
            section: sheet.section(),
            date: sheet.date(),
            entries: sheet.entries(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttendanceMark {
    scout_id: Uuid,
    present: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProgressView {
    scout_id: Uuid,
    entries: Vec<Progress>,
}

impl From<&ProgressBoard> for ProgressView {
    fn from(board: &ProgressBoard) -> Self {
        Self {
            scout_id: board.scout_id(),
            entries: board.entries().to_vec(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProgressUpdate {
    kind: ProgressKind,
    name: String,
    /// One of 0, 25, 50, 75 or 100.
    percentage: u8,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewSpecialty {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BalanceInput {
    /// Decimal amount as typed, e.g. `"1520.50"`.
    #[serde(default)]
    amount: String,
}

#[utoipa::path(
    get,
    path = "/v1/admin/sections/{section}/scouts",
    params(("section" = Section, Path, description = "manada or tropa")),
    responses(
        (status = 200, description = "Scouts of the section by name", body = [Scout]),
        (status = 303, description = "Redirected by the route guard")
    ),
    tag = "admin"
)]
pub async fn section_scouts(
    portal: Extension<Portal>,
    Path(section): Path<Section>,
) -> Result<Json<Vec<Scout>>, ApiError> {
    authorize(&portal, ADMIN)?;
    Ok(Json(
        scouts::list_section(portal.data.as_ref(), section).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/v1/admin/scouts/{id}",
    operation_id = "admin_update_scout",
    params(("id" = Uuid, Path, description = "Scout id")),
    request_body = ScoutDraft,
    responses(
        (status = 204, description = "Scout updated"),
        (status = 422, description = "Missing field", body = ErrorBody)
    ),
    tag = "admin"
)]
pub async fn update_scout(
    portal: Extension<Portal>,
    Path(id): Path<Uuid>,
    Json(draft): Json<ScoutDraft>,
) -> Result<StatusCode, ApiError> {
    authorize(&portal, ADMIN)?;
    scouts::update(portal.data.as_ref(), id, &draft).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/admin/sections/{section}/attendance",
    params(("section" = Section, Path, description = "manada or tropa"), SheetParams),
    responses(
        (status = 200, description = "Roll call for the date", body = AttendanceView)
    ),
    tag = "admin"
)]
pub async fn attendance_sheet(
    portal: Extension<Portal>,
    Path(section): Path<Section>,
    Query(params): Query<SheetParams>,
) -> Result<Json<AttendanceView>, ApiError> {
    authorize(&portal, ADMIN)?;
    let sheet = AttendanceSheet::load(portal.data.as_ref(), section, params.date()).await?;
    Ok(Json(AttendanceView::from(&sheet)))
}

#[utoipa::path(
    post,
    path = "/v1/admin/sections/{section}/attendance/{scout_id}",
    params(
        ("section" = Section, Path, description = "manada or tropa"),
        ("scout_id" = Uuid, Path, description = "Scout id"),
        SheetParams
    ),
    responses(
        (status = 200, description = "Mark after the toggle", body = AttendanceMark),
        (status = 422, description = "Scout is not in the section", body = ErrorBody)
    ),
    tag = "admin"
)]
#[instrument(skip(portal))]
pub async fn toggle_attendance(
    portal: Extension<Portal>,
    Path((section, scout_id)): Path<(Section, Uuid)>,
    Query(params): Query<SheetParams>,
) -> Result<Json<AttendanceMark>, ApiError> {
    let admin = authorize(&portal, ADMIN)?;
    let mut sheet = AttendanceSheet::load(portal.data.as_ref(), section, params.date()).await?;
    let present = sheet
        .toggle(portal.data.as_ref(), &admin, scout_id)
        .await?;
    Ok(Json(AttendanceMark { scout_id, present }))
}

#[utoipa::path(
    get,
    path = "/v1/admin/sections/{section}/stages",
    params(("section" = Section, Path, description = "manada or tropa")),
    responses(
        (status = 200, description = "Stage names tracked for the section", body = [String])
    ),
    tag = "admin"
)]
pub async fn stages(
    portal: Extension<Portal>,
    Path(section): Path<Section>,
) -> Result<Json<Vec<String>>, ApiError> {
    authorize(&portal, ADMIN)?;
    Ok(Json(stage_levels(section)))
}

#[utoipa::path(
    get,
    path = "/v1/admin/scouts/{id}/progress",
    params(("id" = Uuid, Path, description = "Scout id")),
    responses(
        (status = 200, description = "Stages and specialties of the scout", body = ProgressView)
    ),
    tag = "admin"
)]
pub async fn progress_board(
    portal: Extension<Portal>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProgressView>, ApiError> {
    authorize(&portal, ADMIN)?;
    let board = ProgressBoard::load(portal.data.as_ref(), id).await?;
    Ok(Json(ProgressView::from(&board)))
}

#[utoipa::path(
    put,
    path = "/v1/admin/scouts/{id}/progress",
    params(("id" = Uuid, Path, description = "Scout id")),
    request_body = ProgressUpdate,
    responses(
        (status = 200, description = "Board after the change", body = ProgressView)
    ),
    tag = "admin"
)]
pub async fn set_progress(
    portal: Extension<Portal>,
    Path(id): Path<Uuid>,
    Json(update): Json<ProgressUpdate>,
) -> Result<Json<ProgressView>, ApiError> {
    let admin = authorize(&portal, ADMIN)?;
    let percentage = Percentage::try_from(update.percentage)?;
    let mut board = ProgressBoard::load(portal.data.as_ref(), id).await?;
    board
        .set(
            portal.data.as_ref(),
            &admin,
            update.kind,
            &update.name,
            percentage,
        )
        .await?;
    Ok(Json(ProgressView::from(&board)))
}

#[utoipa::path(
    post,
    path = "/v1/admin/scouts/{id}/specialties",
    params(("id" = Uuid, Path, description = "Scout id")),
    request_body = NewSpecialty,
    responses(
        (status = 201, description = "Specialty tracked at 0%", body = ProgressView),
        (status = 422, description = "Blank name", body = ErrorBody)
    ),
    tag = "admin"
)]
pub async fn add_specialty(
    portal: Extension<Portal>,
    Path(id): Path<Uuid>,
    Json(specialty): Json<NewSpecialty>,
) -> Result<(StatusCode, Json<ProgressView>), ApiError> {
    let admin = authorize(&portal, ADMIN)?;
    let mut board = ProgressBoard::load(portal.data.as_ref(), id).await?;
    board
        .add_specialty(portal.data.as_ref(), &admin, &specialty.name)
        .await?;
    Ok((StatusCode::CREATED, Json(ProgressView::from(&board))))
}

#[utoipa::path(
    get,
    path = "/v1/admin/announcements",
    operation_id = "admin_announcements",
    responses(
        (status = 200, description = "Announcements, newest first", body = [Announcement])
    ),
    tag = "admin"
)]
pub async fn announcements(portal: Extension<Portal>) -> Result<Json<Vec<Announcement>>, ApiError> {
    authorize(&portal, ADMIN)?;
    Ok(Json(announcements::list(portal.data.as_ref()).await?))
}

#[utoipa::path(
    post,
    path = "/v1/admin/announcements",
    request_body = AnnouncementDraft,
    responses(
        (status = 201, description = "Announcement published", body = Announcement),
        (status = 422, description = "Missing field", body = ErrorBody)
    ),
    tag = "admin"
)]
pub async fn publish_announcement(
    portal: Extension<Portal>,
    Json(draft): Json<AnnouncementDraft>,
) -> Result<(StatusCode, Json<Announcement>), ApiError> {
    let admin = authorize(&portal, ADMIN)?;
    let announcement = announcements::publish(portal.data.as_ref(), &admin, &draft).await?;
    Ok((StatusCode::CREATED, Json(announcement)))
}

#[utoipa::path(
    delete,
    path = "/v1/admin/announcements/{id}",
    params(("id" = Uuid, Path, description = "Announcement id")),
    responses(
        (status = 204, description = "Announcement removed")
    ),
    tag = "admin"
)]
pub async fn delete_announcement(
    portal: Extension<Portal>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    authorize(&portal, ADMIN)?;
    announcements::remove(portal.data.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/admin/activities",
    operation_id = "admin_activities",
    responses(
        (status = 200, description = "Upcoming activities, soonest first", body = [Activity])
    ),
    tag = "admin"
)]
pub async fn activities(portal: Extension<Portal>) -> Result<Json<Vec<Activity>>, ApiError> {
    authorize(&portal, ADMIN)?;
    Ok(Json(
        activities::upcoming(portal.data.as_ref(), Utc::now()).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/v1/admin/activities",
    request_body = ActivityDraft,
    responses(
        (status = 201, description = "Activity scheduled", body = Activity),
        (status = 422, description = "Missing field", body = ErrorBody)
    ),
    tag = "admin"
)]
pub async fn schedule_activity(
    portal: Extension<Portal>,
    Json(draft): Json<ActivityDraft>,
) -> Result<(StatusCode, Json<Activity>), ApiError> {
    let admin = authorize(&portal, ADMIN)?;
    let activity = activities::schedule(portal.data.as_ref(), &admin, &draft).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

#[utoipa::path(
    delete,
    path = "/v1/admin/activities/{id}",
    params(("id" = Uuid, Path, description = "Activity id")),
    responses(
        (status = 204, description = "Activity removed")
    ),
    tag = "admin"
)]
pub async fn delete_activity(
    portal: Extension<Portal>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    authorize(&portal, ADMIN)?;
    activities::remove(portal.data.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/admin/finance",
    responses(
        (status = 200, description = "Group balance", body = GroupFinance)
    ),
    tag = "admin"
)]
pub async fn finance(portal: Extension<Portal>) -> Result<Json<GroupFinance>, ApiError> {
    authorize(&portal, ADMIN)?;
    Ok(Json(finance::load(portal.data.as_ref()).await?))
}

#[utoipa::path(
    put,
    path = "/v1/admin/finance",
    request_body = BalanceInput,
    responses(
        (status = 200, description = "Balance after the change", body = GroupFinance),
        (status = 422, description = "Invalid amount", body = ErrorBody)
    ),
    tag = "admin"
)]
pub async fn set_balance(
    portal: Extension<Portal>,
    Json(input): Json<BalanceInput>,
) -> Result<Json<GroupFinance>, ApiError> {
    let admin = authorize(&portal, ADMIN)?;
    Ok(Json(
        finance::set_balance(portal.data.as_ref(), &admin, &input.amount).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/v1/admin/approvals",
    responses(
        (status = 200, description = "Accounts waiting for approval", body = [PendingProfile])
    ),
    tag = "admin"
)]
pub async fn pending_approvals(
    portal: Extension<Portal>,
) -> Result<Json<Vec<PendingProfile>>, ApiError> {
    authorize(&portal, ADMIN)?;
    Ok(Json(approvals::pending(portal.data.as_ref()).await?))
}

#[utoipa::path(
    post,
    path = "/v1/admin/approvals/{id}",
    params(("id" = Uuid, Path, description = "Profile id")),
    responses(
        (status = 204, description = "Account approved as a parent")
    ),
    tag = "admin"
)]
#[instrument(skip(portal))]
pub async fn approve(portal: Extension<Portal>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    authorize(&portal, ADMIN)?;
    approvals::approve(portal.data.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
