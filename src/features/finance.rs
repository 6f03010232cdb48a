use super::ScreenError;
use crate::backend::{Collection, DataService, Identity, Query, select_one_as};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// The group keeps a single balance row.
pub const FINANCE_ROW_ID: i64 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GroupFinance {
    pub id: i64,
    pub balance: f64,
    #[serde(default)]
    pub last_updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_by: Option<Uuid>,
}

impl Default for GroupFinance {
    fn default() -> Self {
        Self {
            id: FINANCE_ROW_ID,
            balance: 0.0,
            last_updated_at: None,
            updated_by: None,
        }
    }
}

/// Parses a balance typed by an admin.
///
/// # Errors
/// Returns a validation error unless the input is a finite number.
pub fn parse_amount(input: &str) -> Result<f64, ScreenError> {
    input
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite())
        .ok_or_else(|| ScreenError::invalid("Invalid amount."))
}

async fn current(data: &dyn DataService) -> Result<Option<GroupFinance>, ScreenError> {
    let query = Query::new().eq("id", FINANCE_ROW_ID);
    Ok(select_one_as(data, Collection::GroupFinance, query).await?)
}

/// Current balance; a group without a row has a balance of zero.
///
/// # Errors
/// Returns the service error.
pub async fn load(data: &dyn DataService) -> Result<GroupFinance, ScreenError> {
    Ok(current(data).await?.unwrap_or_default())
}

/// # Errors
/// Returns a validation error for unparsable input, or the service error.
#[instrument(skip(data, actor), fields(actor = %actor.id))]
pub async fn set_balance(
    data: &dyn DataService,
    actor: &Identity,
    input: &str,
) -> Result<GroupFinance, ScreenError> {
    let balance = parse_amount(input)?;

    if current(data).await?.is_some() {
        data.update(
            Collection::GroupFinance,
            &FINANCE_ROW_ID.to_string(),
            json!({
                "balance": balance,
                "last_updated_at": Utc::now(),
                "updated_by": actor.id,
            }),
        )
        .await?;
    } else {
        data.insert(
            Collection::GroupFinance,
            json!({
                "id": FINANCE_ROW_ID,
                "balance": balance,
                "updated_by": actor.id,
            }),
        )
        .await?;
    }

    info!(balance, "Group balance updated");
    load(data).await
}
