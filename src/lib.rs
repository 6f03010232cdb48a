//! # Scoutpost (Group Administration & Parent Portal)
//!
//! `scoutpost` is the portal of a scouting group: administrators manage
//! members, attendance, personal progress, announcements, activities and the
//! group balance; parents register and follow their own scouts.
//!
//! All persistence and authorization live in a hosted auth + data service.
//! The portal talks to it through [`backend::AuthService`] and
//! [`backend::DataService`], and row-level security on the service side is
//! the only real access boundary.
//!
//! ## Authentication
//!
//! A single [`auth::AuthOrchestrator`] owns the process-wide
//! [`auth::AuthState`]. On start it restores a persisted session under a hard
//! deadline, then keeps the state in sync with the service's session change
//! notifications. Roles (`admin`, `parent`) and approval status (`pending`,
//! `approved`) come from the `profiles` collection, which is provisioned
//! asynchronously after signup, so profile reads are retried within a bounded
//! budget.
//!
//! ## Route Guard
//!
//! [`auth::guard`] maps the auth state and the roles a route accepts to a
//! decision: wait, render, redirect, or show the pending-approval screen.
//! Pending accounts are blocked from every protected route regardless of role.

pub mod api;
pub mod auth;
pub mod backend;
pub mod cli;
pub mod features;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
