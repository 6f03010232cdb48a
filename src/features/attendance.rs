use super::{
    ScreenError,
    scouts::{self, Scout, Section},
};
use crate::backend::{BackendError, Collection, DataService, Identity, Query, select_as, select_one_as};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct AttendanceRow {
    scout_id: Uuid,
    is_present: bool,
}

#[derive(Debug, Deserialize)]
struct RowId {
    id: Uuid,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct AttendanceEntry {
    pub scout: Scout,
    pub present: bool,
}

/// Roll call of one section on one date.
#[derive(Debug)]
pub struct AttendanceSheet {
    section: Section,
    date: NaiveDate,
    scouts: Vec<Scout>,
    present: HashMap<Uuid, bool>,
}

impl AttendanceSheet {
    /// # Errors
    /// Returns the service error.
    pub async fn load(
        data: &dyn DataService,
        section: Section,
        date: NaiveDate,
    ) -> Result<Self, ScreenError> {
        let scouts = scouts::list_section(data, section).await?;
        let rows: Vec<AttendanceRow> =
            select_as(data, Collection::Attendance, &Query::new().eq("date", date)).await?;

        Ok(Self {
            section,
            date,
            scouts,
            present: rows
                .into_iter()
                .map(|row| (row.scout_id, row.is_present))
                .collect(),
        })
    }

    #[must_use]
    pub fn section(&self) -> Section {
        self.section
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    #[must_use]
    pub fn is_present(&self, scout_id: Uuid) -> bool {
        self.present.get(&scout_id).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn entries(&self) -> Vec<AttendanceEntry> {
        self.scouts
            .iter()
            .map(|scout| AttendanceEntry {
                scout: scout.clone(),
                present: self.is_present(scout.id),
            })
            .collect()
    }

    /// Flips the mark of `scout_id` and records it. The sheet shows the new
    /// mark right away and reverts it if the write fails.
    ///
    /// # Errors
    /// Returns a validation error for scouts not on the sheet, or the service error.
    #[instrument(skip(self, data, recorded_by), fields(date = %self.date))]
    pub async fn toggle(
        &mut self,
        data: &dyn DataService,
        recorded_by: &Identity,
        scout_id: Uuid,
    ) -> Result<bool, ScreenError> {
        if !self.scouts.iter().any(|scout| scout.id == scout_id) {
            return Err(ScreenError::invalid("Scout is not part of this section."));
        }

        let previous = self.is_present(scout_id);
        let next = !previous;
        self.present.insert(scout_id, next);

        if let Err(err) = self.record(data, recorded_by, scout_id, next).await {
            warn!("Failed to save attendance: {}", err);
            self.present.insert(scout_id, previous);
            return Err(err.into());
        }
        Ok(next)
    }

    async fn record(
        &self,
        data: &dyn DataService,
        recorded_by: &Identity,
        scout_id: Uuid,
        present: bool,
    ) -> Result<(), BackendError> {
        let query = Query::new().eq("scout_id", scout_id).eq("date", self.date);
        let existing: Option<RowId> = select_one_as(data, Collection::Attendance, query).await?;

        match existing {
            Some(row) => {
                data.update(
                    Collection::Attendance,
                    &row.id.to_string(),
                    json!({ "is_present": present, "recorded_by": recorded_by.id }),
                )
                .await
            }
            None => data
                .insert(
                    Collection::Attendance,
                    json!({
                        "scout_id": scout_id,
                        "date": self.date,
                        "is_present": present,
                        "recorded_by": recorded_by.id,
                    }),
                )
                .await
                .map(|_| ()),
        }
    }
}
