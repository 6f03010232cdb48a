use super::{ScreenError, required};
use crate::backend::{Collection, DataService, Identity, Query, insert_as, select_as};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

fn active() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author_id: Option<Uuid>,
    #[serde(default = "active")]
    pub is_active: bool,
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct AnnouncementDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Serialize)]
struct NewAnnouncement {
    title: String,
    content: String,
    author_id: Uuid,
}

/// Announcements, newest first.
///
/// # Errors
/// Returns the service error.
pub async fn list(data: &dyn DataService) -> Result<Vec<Announcement>, ScreenError> {
    let query = Query::new().order_by("created_at", false);
    Ok(select_as(data, Collection::Announcements, &query).await?)
}

/// # Errors
/// Returns a validation error for a blank title or content, or the service error.
pub async fn publish(
    data: &dyn DataService,
    author: &Identity,
    draft: &AnnouncementDraft,
) -> Result<Announcement, ScreenError> {
    let record = NewAnnouncement {
        title: required(&draft.title, "Title is required.")?,
        content: required(&draft.content, "Content is required.")?,
        author_id: author.id,
    };
    let announcement: Announcement = insert_as(data, Collection::Announcements, &record).await?;
    info!(announcement = %announcement.id, "Announcement published");
    Ok(announcement)
}

/// # Errors
/// Returns the service error.
pub async fn remove(data: &dyn DataService, id: Uuid) -> Result<(), ScreenError> {
    data.delete(Collection::Announcements, &id.to_string()).await?;
    Ok(())
}
