use crate::backend::Identity;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Parent,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Parent => "parent",
        }
    }

    /// Canonical landing route for the role.
    #[must_use]
    pub const fn home(self) -> &'static str {
        match self {
            Self::Admin => "/admin",
            Self::Parent => "/dashboard",
        }
    }
}

/// Approval status. Accounts start `pending` until an administrator approves them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pending,
    Approved,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
        }
    }
}

/// Row of the `profiles` collection as stored; `role` and `status` may be null.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ProfileRow {
    pub id: Uuid,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub status: Option<Status>,
}

/// Authorization record of an identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub id: Uuid,
    pub role: Option<Role>,
    pub status: Status,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            role: row.role,
            // Unknown status never grants access.
            status: row.status.unwrap_or_default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    Bootstrapping,
    Unauthenticated,
    AuthenticatedResolving,
    AuthenticatedReady,
    AuthenticatedError,
}

/// Process-wide authentication state published by the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthState {
    pub phase: AuthPhase,
    pub identity: Option<Identity>,
    pub profile: Option<Profile>,
    pub loading: bool,
    pub error: Option<String>,
}

impl AuthState {
    #[must_use]
    pub fn bootstrapping() -> Self {
        Self {
            phase: AuthPhase::Bootstrapping,
            identity: None,
            profile: None,
            loading: true,
            error: None,
        }
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.profile.as_ref().and_then(|profile| profile.role)
    }

    #[must_use]
    pub fn status(&self) -> Option<Status> {
        self.profile.as_ref().map(|profile| profile.status)
    }
}
