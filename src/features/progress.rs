//! Personal progression of a scout: stages of the section (and compasses for
//! the troop) plus free-form specialties, each tracked in quarter steps.

use super::{ScreenError, required, scouts::Section};
use crate::backend::{Collection, DataService, Identity, Query, insert_as, select_as};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

pub const PACK_STAGES: [&str; 4] = ["Pata tierna", "Saltador(a)", "Rastreador(a)", "Cazador(a)"];
pub const TROOP_STAGES: [&str; 4] = ["Aventurero", "Intrépido", "Pionero", "Explorador"];
pub const TROOP_COMPASSES: [&str; 4] = ["Bronce", "Plata", "Oro", "Platino"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ProgressKind {
    #[serde(rename = "etapa")]
    Stage,
    #[serde(rename = "especialidad")]
    Specialty,
}

/// Completion in quarter steps: 0, 25, 50, 75 or 100.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "u8", into = "u8")]
pub struct Percentage(u8);

impl Percentage {
    pub const ZERO: Self = Self(0);
    pub const STEPS: [u8; 5] = [0, 25, 50, 75, 100];

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Percentage {
    type Error = ScreenError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if Self::STEPS.contains(&value) {
            Ok(Self(value))
        } else {
            Err(ScreenError::invalid(
                "Percentage must be one of 0, 25, 50, 75 or 100.",
            ))
        }
    }
}

impl From<Percentage> for u8 {
    fn from(percentage: Percentage) -> Self {
        percentage.0
    }
}

/// Stored name of a troop compass.
#[must_use]
pub fn compass_name(compass: &str) -> String {
    format!("Brújula {compass}")
}

/// Stage names tracked for a section, in progression order. The troop also
/// tracks its compasses.
#[must_use]
pub fn stage_levels(section: Section) -> Vec<String> {
    match section {
        Section::Pack => PACK_STAGES.iter().map(ToString::to_string).collect(),
        Section::Troop => TROOP_STAGES
            .iter()
            .map(ToString::to_string)
            .chain(TROOP_COMPASSES.iter().map(|compass| compass_name(compass)))
            .collect(),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Progress {
    pub id: Uuid,
    pub scout_id: Uuid,
    #[serde(rename = "type")]
    pub kind: ProgressKind,
    pub name: String,
    pub percentage: Percentage,
    #[serde(default)]
    pub last_updated_by: Option<Uuid>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct NewProgress<'a> {
    scout_id: Uuid,
    #[serde(rename = "type")]
    kind: ProgressKind,
    name: &'a str,
    percentage: Percentage,
    last_updated_by: Uuid,
}

/// Every progress entry of one scout.
#[derive(Clone, Debug)]
pub struct ProgressBoard {
    scout_id: Uuid,
    entries: Vec<Progress>,
}

impl ProgressBoard {
    /// # Errors
    /// Returns the service error.
    pub async fn load(data: &dyn DataService, scout_id: Uuid) -> Result<Self, ScreenError> {
        let entries = select_as(
            data,
            Collection::Progress,
            &Query::new().eq("scout_id", scout_id),
        )
        .await?;
        Ok(Self { scout_id, entries })
    }

    #[must_use]
    pub fn scout_id(&self) -> Uuid {
        self.scout_id
    }

    #[must_use]
    pub fn entries(&self) -> &[Progress] {
        &self.entries
    }

    /// Current percentage of an entry, `None` when it was never recorded.
    #[must_use]
    pub fn percentage_of(&self, kind: ProgressKind, name: &str) -> Option<Percentage> {
        self.position(kind, name)
            .map(|index| self.entries[index].percentage)
    }

    pub fn specialties(&self) -> impl Iterator<Item = &Progress> {
        self.entries
            .iter()
            .filter(|entry| entry.kind == ProgressKind::Specialty)
    }

    fn position(&self, kind: ProgressKind, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.kind == kind && entry.name == name)
    }

    /// Records `percentage` for an entry, creating it when missing. The board
    /// shows the new value right away and goes back to its previous content
    /// if the write fails.
    ///
    /// # Errors
    /// Returns the service error.
    #[instrument(skip(self, data, actor), fields(scout = %self.scout_id))]
    pub async fn set(
        &mut self,
        data: &dyn DataService,
        actor: &Identity,
        kind: ProgressKind,
        name: &str,
        percentage: Percentage,
    ) -> Result<(), ScreenError> {
        let snapshot = self.entries.clone();
        let existing = self.position(kind, name);

        let saved = match existing {
            Some(index) => {
                let entry = &mut self.entries[index];
                entry.percentage = percentage;
                entry.updated_at = Some(Utc::now());
                data.update(
                    Collection::Progress,
                    &entry.id.to_string(),
                    json!({
                        "percentage": percentage,
                        "updated_at": Utc::now(),
                        "last_updated_by": actor.id,
                    }),
                )
                .await
            }
            None => {
                self.entries.push(Progress {
                    id: Uuid::nil(),
                    scout_id: self.scout_id,
                    kind,
                    name: name.to_string(),
                    percentage,
                    last_updated_by: Some(actor.id),
                    updated_at: Some(Utc::now()),
                });
                let record = NewProgress {
                    scout_id: self.scout_id,
                    kind,
                    name,
                    percentage,
                    last_updated_by: actor.id,
                };
                insert_as::<Progress, _>(data, Collection::Progress, &record)
                    .await
                    .map(|stored| {
                        if let Some(placeholder) = self.entries.last_mut() {
                            *placeholder = stored;
                        }
                    })
            }
        };

        if let Err(err) = saved {
            warn!("Failed to save progress: {}", err);
            self.entries = snapshot;
            return Err(err.into());
        }
        Ok(())
    }

    /// Starts tracking a specialty at 0%.
    ///
    /// # Errors
    /// Returns a validation error for a blank name, or the service error.
    pub async fn add_specialty(
        &mut self,
        data: &dyn DataService,
        actor: &Identity,
        name: &str,
    ) -> Result<(), ScreenError> {
        let name = required(name, "Specialty name is required.")?;
        self.set(data, actor, ProgressKind::Specialty, &name, Percentage::ZERO)
            .await
    }
}
