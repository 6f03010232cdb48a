//! Route gating by role and approval status. Pure functions of [`AuthState`];
//! the same inputs always give the same decision.

use super::types::{AuthState, Role, Status};
use serde::Serialize;
use utoipa::ToSchema;

pub const LOGIN_ROUTE: &str = "/login";
pub const FALLBACK_ROUTE: &str = "/";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "decision", content = "location", rename_all = "snake_case")]
pub enum GuardDecision {
    /// State is still settling; show a neutral indicator and never redirect.
    Wait,
    Render,
    RedirectTo(String),
    PendingApproval,
}

/// Decides what a route requiring one of `allowed` (or any signed-in user
/// when `None`) shows for `state`.
#[must_use]
pub fn evaluate(state: &AuthState, allowed: Option<&[Role]>) -> GuardDecision {
    if state.loading {
        return GuardDecision::Wait;
    }
    if state.identity.is_none() {
        return GuardDecision::RedirectTo(LOGIN_ROUTE.to_string());
    }
    let Some(profile) = &state.profile else {
        return GuardDecision::RedirectTo(FALLBACK_ROUTE.to_string());
    };
    if profile.status == Status::Pending {
        return GuardDecision::PendingApproval;
    }

    match (allowed, profile.role) {
        (None, _) => GuardDecision::Render,
        (Some(allowed), Some(role)) if allowed.contains(&role) => GuardDecision::Render,
        (Some(_), role) => GuardDecision::RedirectTo(home_of(role).to_string()),
    }
}

/// Canonical landing route for a role; `/` when the role is unknown.
#[must_use]
pub fn home_of(role: Option<Role>) -> &'static str {
    role.map_or(FALLBACK_ROUTE, Role::home)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteAccess {
    Public,
    Restricted(&'static [Role]),
}

const PARENT_ONLY: &[Role] = &[Role::Parent];
const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Access rule for a portal path, `None` for unknown paths.
#[must_use]
pub fn route_access(path: &str) -> Option<RouteAccess> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    let under = |prefix: &str| {
        path == prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    };

    if path == FALLBACK_ROUTE || path == LOGIN_ROUTE {
        Some(RouteAccess::Public)
    } else if under("/dashboard") {
        Some(RouteAccess::Restricted(PARENT_ONLY))
    } else if under("/admin") {
        Some(RouteAccess::Restricted(ADMIN_ONLY))
    } else {
        None
    }
}

/// Decision for navigating to `path`.
#[must_use]
pub fn navigate(state: &AuthState, path: &str) -> GuardDecision {
    match route_access(path) {
        Some(RouteAccess::Public) => GuardDecision::Render,
        Some(RouteAccess::Restricted(allowed)) => evaluate(state, Some(allowed)),
        None => GuardDecision::RedirectTo(FALLBACK_ROUTE.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::types::{AuthPhase, Profile};
    use crate::backend::Identity;
    use uuid::Uuid;

    fn signed_in(role: Option<Role>, status: Status) -> AuthState {
        let id = Uuid::new_v4();
        AuthState {
            phase: AuthPhase::AuthenticatedReady,
            identity: Some(Identity {
                id,
                email: "someone@example.org".to_string(),
            }),
            profile: Some(Profile { id, role, status }),
            loading: false,
            error: None,
        }
    }

    fn signed_out() -> AuthState {
        AuthState {
            phase: AuthPhase::Unauthenticated,
            identity: None,
            profile: None,
            loading: false,
            error: None,
        }
    }

    fn redirect(path: &str) -> GuardDecision {
        GuardDecision::RedirectTo(path.to_string())
    }

    #[test]
    fn loading_waits_without_redirecting() {
        let mut state = signed_out();
        state.loading = true;
        assert_eq!(evaluate(&state, Some(ADMIN_ONLY)), GuardDecision::Wait);
        assert_eq!(evaluate(&AuthState::bootstrapping(), None), GuardDecision::Wait);
    }

    #[test]
    fn anonymous_goes_to_login() {
        assert_eq!(evaluate(&signed_out(), Some(PARENT_ONLY)), redirect("/login"));
        assert_eq!(navigate(&signed_out(), "/admin/finance"), redirect("/login"));
    }

    #[test]
    fn pending_blocks_every_requirement() {
        for role in [Some(Role::Admin), Some(Role::Parent), None] {
            let state = signed_in(role, Status::Pending);
            assert_eq!(evaluate(&state, None), GuardDecision::PendingApproval);
            assert_eq!(evaluate(&state, Some(ADMIN_ONLY)), GuardDecision::PendingApproval);
            assert_eq!(evaluate(&state, Some(PARENT_ONLY)), GuardDecision::PendingApproval);
        }
    }

    #[test]
    fn wrong_role_goes_home() {
        let parent = signed_in(Some(Role::Parent), Status::Approved);
        assert_eq!(navigate(&parent, "/admin"), redirect("/dashboard"));
        assert_eq!(navigate(&parent, "/dashboard/scouts"), GuardDecision::Render);

        let admin = signed_in(Some(Role::Admin), Status::Approved);
        assert_eq!(navigate(&admin, "/dashboard"), redirect("/admin"));
        assert_eq!(navigate(&admin, "/admin/"), GuardDecision::Render);
    }

    #[test]
    fn missing_role_falls_back_to_root() {
        let state = signed_in(None, Status::Approved);
        assert_eq!(evaluate(&state, Some(ADMIN_ONLY)), redirect("/"));
        assert_eq!(evaluate(&state, None), GuardDecision::Render);
    }

    #[test]
    fn unresolved_profile_shows_no_dashboard() {
        let mut state = signed_in(Some(Role::Admin), Status::Approved);
        state.profile = None;
        state.phase = AuthPhase::AuthenticatedError;
        state.error = Some("Profile synchronization failed. Contact an administrator.".to_string());
        assert_eq!(navigate(&state, "/admin"), redirect("/"));
        assert_eq!(navigate(&state, "/dashboard"), redirect("/"));
    }

    #[test]
    fn route_table() {
        assert_eq!(route_access("/"), Some(RouteAccess::Public));
        assert_eq!(route_access("/login"), Some(RouteAccess::Public));
        assert_eq!(route_access("/login?next=/admin"), Some(RouteAccess::Public));
        assert_eq!(route_access("/dashboard"), Some(RouteAccess::Restricted(PARENT_ONLY)));
        assert_eq!(route_access("/admin/scouts"), Some(RouteAccess::Restricted(ADMIN_ONLY)));
        assert_eq!(route_access("/administrator"), None);
        assert_eq!(route_access("/nowhere"), None);
        assert_eq!(navigate(&signed_out(), "/nowhere"), redirect("/"));
        assert_eq!(navigate(&signed_out(), "/login"), GuardDecision::Render);
    }

    #[test]
    fn decisions_are_deterministic() {
        let state = signed_in(Some(Role::Parent), Status::Approved);
        for path in ["/", "/admin", "/dashboard", "/x"] {
            assert_eq!(navigate(&state, path), navigate(&state, path));
        }
    }
}
