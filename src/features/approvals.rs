use super::ScreenError;
use crate::auth::{Role, Status};
use crate::backend::{Collection, DataService, Query, select_as};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

/// Account waiting for an administrator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PendingProfile {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Pending accounts, most recently updated first.
///
/// # Errors
/// Returns the service error.
pub async fn pending(data: &dyn DataService) -> Result<Vec<PendingProfile>, ScreenError> {
    let query = Query::new()
        .eq("status", Status::Pending.as_str())
        .order_by("updated_at", false);
    Ok(select_as(data, Collection::Profiles, &query).await?)
}

/// Approves an account as a parent.
///
/// # Errors
/// Returns the service error.
pub async fn approve(data: &dyn DataService, id: Uuid) -> Result<(), ScreenError> {
    data.update(
        Collection::Profiles,
        &id.to_string(),
        json!({
            "status": Status::Approved,
            "role": Role::Parent,
            "updated_at": Utc::now(),
        }),
    )
    .await?;
    info!(profile = %id, "Account approved");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::auth::{ProfileResolver, ResolvePolicy};
    use crate::backend::memory::MemoryBackend;
    use std::{sync::Arc, time::Duration};

    #[tokio::test]
    async fn approving_unblocks_the_account() {
        let backend = Arc::new(MemoryBackend::new());
        let family = backend.add_account("family@example.org", "secret");
        let admin = backend.add_account("admin@example.org", "secret");
        backend.add_profile(&family, "parent", Some("pending"));
        backend.add_profile(&admin, "admin", Some("approved"));

        let waiting = pending(backend.as_ref()).await.unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].id, family.id);
        assert_eq!(waiting[0].email.as_deref(), Some("family@example.org"));

        approve(backend.as_ref(), family.id).await.unwrap();
        assert!(pending(backend.as_ref()).await.unwrap().is_empty());

        let resolver = ProfileResolver::new(backend.clone(), ResolvePolicy::default());
        let profile = resolver
            .resolve_once(family.id, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(profile.status, Status::Approved);
        assert_eq!(profile.role, Some(Role::Parent));
    }

    #[tokio::test]
    async fn newest_requests_first() {
        let backend = MemoryBackend::new();
        for (email, updated_at) in [
            ("old@example.org", "2025-01-01T00:00:00Z"),
            ("new@example.org", "2025-03-01T00:00:00Z"),
        ] {
            backend.seed(
                Collection::Profiles,
                json!({
                    "id": Uuid::new_v4(),
                    "email": email,
                    "role": "parent",
                    "status": "pending",
                    "updated_at": updated_at,
                }),
            );
        }
        let emails: Vec<Option<String>> = pending(&backend)
            .await
            .unwrap()
            .into_iter()
            .map(|profile| profile.email)
            .collect();
        assert_eq!(
            emails,
            [Some("new@example.org".to_string()), Some("old@example.org".to_string())]
        );
    }
}
