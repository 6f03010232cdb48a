//! Scouts registered by parents, and the per-section roster admins manage.

use super::{ScreenError, required};
use crate::backend::{
    Collection, DataService, Identity, Query, insert_as, select_as, to_patch,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Section {
    #[serde(rename = "manada")]
    Pack,
    #[serde(rename = "tropa")]
    Troop,
}

impl Section {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pack => "manada",
            Self::Troop => "tropa",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = ScreenError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "manada" => Ok(Self::Pack),
            "tropa" => Ok(Self::Troop),
            _ => Err(ScreenError::invalid(format!("Unknown section: {value}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Scout {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub section: Section,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Scout {
    /// Whole years of age on `today`.
    #[must_use]
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        today.years_since(self.date_of_birth).unwrap_or(0)
    }
}

/// Scout form as submitted; every field is required.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct ScoutDraft {
    #[serde(default)]
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub section: Option<Section>,
}

#[derive(Debug, Serialize)]
struct ScoutRecord {
    full_name: String,
    date_of_birth: NaiveDate,
    section: Section,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<Uuid>,
}

impl ScoutDraft {
    fn validate(&self) -> Result<ScoutRecord, ScreenError> {
        let full_name = required(&self.full_name, "Name is required.")?;
        let date_of_birth = self
            .date_of_birth
            .ok_or_else(|| ScreenError::invalid("Date of birth is required."))?;
        let section = self
            .section
            .ok_or_else(|| ScreenError::invalid("Section is required."))?;
        Ok(ScoutRecord {
            full_name,
            date_of_birth,
            section,
            parent_id: None,
        })
    }
}

/// Scouts registered by `parent`, oldest registration first.
///
/// # Errors
/// Returns the service error.
pub async fn list_mine(data: &dyn DataService, parent: &Identity) -> Result<Vec<Scout>, ScreenError> {
    let query = Query::new()
        .eq("parent_id", parent.id)
        .order_by("created_at", true);
    Ok(select_as(data, Collection::Scouts, &query).await?)
}

/// Every scout of a section ordered by name.
///
/// # Errors
/// Returns the service error.
pub async fn list_section(data: &dyn DataService, section: Section) -> Result<Vec<Scout>, ScreenError> {
    let query = Query::new()
        .eq("section", section)
        .order_by("full_name", true);
    Ok(select_as(data, Collection::Scouts, &query).await?)
}

/// Registers a scout owned by `parent`.
///
/// # Errors
/// Returns a validation error for incomplete drafts, or the service error.
#[instrument(skip(data, draft), fields(parent = %parent.id))]
pub async fn create(
    data: &dyn DataService,
    parent: &Identity,
    draft: &ScoutDraft,
) -> Result<Scout, ScreenError> {
    let mut record = draft.validate()?;
    record.parent_id = Some(parent.id);
    let scout: Scout = insert_as(data, Collection::Scouts, &record).await?;
    info!(scout = %scout.id, section = %scout.section, "Scout registered");
    Ok(scout)
}

/// Corrects name, date of birth or section. The owning parent never changes.
///
/// # Errors
/// Returns a validation error for incomplete drafts, or the service error.
pub async fn update(data: &dyn DataService, id: Uuid, draft: &ScoutDraft) -> Result<(), ScreenError> {
    let record = draft.validate()?;
    data.update(Collection::Scouts, &id.to_string(), to_patch(&record)?)
        .await?;
    Ok(())
}

/// # Errors
/// Returns the service error.
pub async fn remove(data: &dyn DataService, id: Uuid) -> Result<(), ScreenError> {
    data.delete(Collection::Scouts, &id.to_string()).await?;
    Ok(())
}
