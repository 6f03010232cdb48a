use super::{ScreenError, required};
use crate::backend::{Collection, DataService, Identity, Query, insert_as, select_as};
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Activity {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Activity form. `time` is optional; without it the activity starts at midnight UTC.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct ActivityDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub location: String,
}

impl ActivityDraft {
    #[must_use]
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        self.date
            .map(|date| date.and_time(self.time.unwrap_or(NaiveTime::MIN)).and_utc())
    }
}

#[derive(Serialize)]
struct NewActivity {
    title: String,
    description: String,
    date: DateTime<Utc>,
    location: String,
    created_by: Uuid,
}

/// Activities starting at or after `now`, soonest first.
///
/// # Errors
/// Returns the service error.
pub async fn upcoming(data: &dyn DataService, now: DateTime<Utc>) -> Result<Vec<Activity>, ScreenError> {
    let query = Query::new()
        .gte("date", now.to_rfc3339_opts(SecondsFormat::Secs, true))
        .order_by("date", true);
    Ok(select_as(data, Collection::Activities, &query).await?)
}

/// # Errors
/// Returns a validation error when title, date or location is missing, or the service error.
pub async fn schedule(
    data: &dyn DataService,
    creator: &Identity,
    draft: &ActivityDraft,
) -> Result<Activity, ScreenError> {
    let title = required(&draft.title, "Title is required.")?;
    let date = draft
        .starts_at()
        .ok_or_else(|| ScreenError::invalid("Date is required."))?;
    let location = required(&draft.location, "Location is required.")?;

    let record = NewActivity {
        title,
        description: draft.description.trim().to_string(),
        date,
        location,
        created_by: creator.id,
    };
    let activity: Activity = insert_as(data, Collection::Activities, &record).await?;
    info!(activity = %activity.id, date = %activity.date, "Activity scheduled");
    Ok(activity)
}

/// # Errors
/// Returns the service error.
pub async fn remove(data: &dyn DataService, id: Uuid) -> Result<(), ScreenError> {
    data.delete(Collection::Activities, &id.to_string()).await?;
    Ok(())
}
