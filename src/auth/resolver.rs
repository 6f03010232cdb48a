//! Reads the profile of an identity, retrying while the row is still being
//! provisioned. Attempts run inside a total time budget followed by one
//! extended final attempt.

use super::types::{Profile, ProfileRow};
use crate::backend::{BackendError, Collection, DataService, Query, select_one_as};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

pub const PROFILE_SYNC_FAILED: &str = "Profile synchronization failed. Contact an administrator.";

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("{}", PROFILE_SYNC_FAILED)]
    Exhausted { attempts: u32 },
}

/// Why a single profile read produced no profile.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("profile read timed out")]
    Timeout,
    #[error("profile row not found")]
    Missing,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvePolicy {
    budget: Duration,
    attempt_timeout: Duration,
    backoff: Duration,
    final_attempt_timeout: Duration,
}

impl Default for ResolvePolicy {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(5),
            attempt_timeout: Duration::from_secs(2),
            backoff: Duration::from_secs(1),
            final_attempt_timeout: Duration::from_secs(3),
        }
    }
}

impl ResolvePolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub fn with_final_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.final_attempt_timeout = timeout;
        self
    }

    #[must_use]
    pub fn budget(&self) -> Duration {
        self.budget
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Attempt(Duration),
    Final(Duration),
    GiveUp,
}

/// Attempt counter plus deadline; decides what the resolver does next.
#[derive(Debug)]
struct RetrySchedule<'a> {
    policy: &'a ResolvePolicy,
    started: Instant,
    attempts: u32,
    final_attempted: bool,
}

impl<'a> RetrySchedule<'a> {
    fn new(policy: &'a ResolvePolicy, started: Instant) -> Self {
        Self {
            policy,
            started,
            attempts: 0,
            final_attempted: false,
        }
    }

    fn within_budget(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) < self.policy.budget
    }

    fn next_step(&mut self, now: Instant) -> Step {
        if self.within_budget(now) {
            self.attempts += 1;
            Step::Attempt(self.policy.attempt_timeout)
        } else if !self.final_attempted {
            self.final_attempted = true;
            self.attempts += 1;
            Step::Final(self.policy.final_attempt_timeout)
        } else {
            Step::GiveUp
        }
    }

    fn backoff(&self, now: Instant) -> Option<Duration> {
        self.within_budget(now).then_some(self.policy.backoff)
    }
}

#[derive(Clone)]
pub struct ProfileResolver {
    data: Arc<dyn DataService>,
    policy: ResolvePolicy,
}

impl ProfileResolver {
    #[must_use]
    pub fn new(data: Arc<dyn DataService>, policy: ResolvePolicy) -> Self {
        Self { data, policy }
    }

    #[must_use]
    pub fn policy(&self) -> &ResolvePolicy {
        &self.policy
    }

    /// Resolves the profile of `identity_id`, retrying until the budget is
    /// spent and then trying once more with the extended timeout.
    ///
    /// # Errors
    /// Returns `ResolveError::Exhausted` when every attempt failed.
    #[instrument(skip(self))]
    pub async fn resolve(&self, identity_id: Uuid) -> Result<Profile, ResolveError> {
        let mut schedule = RetrySchedule::new(&self.policy, Instant::now());

        loop {
            let timeout = match schedule.next_step(Instant::now()) {
                Step::Attempt(timeout) => timeout,
                Step::Final(timeout) => {
                    info!("Profile budget spent, making a final attempt");
                    timeout
                }
                Step::GiveUp => {
                    error!(attempts = schedule.attempts, "Profile resolution exhausted");
                    return Err(ResolveError::Exhausted {
                        attempts: schedule.attempts,
                    });
                }
            };

            match self.resolve_once(identity_id, timeout).await {
                Ok(profile) => {
                    if schedule.attempts > 1 {
                        info!(attempts = schedule.attempts, "Profile resolved after retry");
                    }
                    return Ok(profile);
                }
                Err(err @ (AttemptError::Missing | AttemptError::Timeout)) => {
                    debug!(attempt = schedule.attempts, "Profile not available yet: {}", err);
                }
                Err(err) => {
                    warn!(attempt = schedule.attempts, "Profile read failed: {}", err);
                }
            }

            if let Some(pause) = schedule.backoff(Instant::now()) {
                tokio::time::sleep(pause).await;
            }
        }
    }

    /// Single profile read bounded by `timeout`.
    ///
    /// # Errors
    /// Returns an `AttemptError` when the read times out, fails or finds no row.
    pub async fn resolve_once(
        &self,
        identity_id: Uuid,
        timeout: Duration,
    ) -> Result<Profile, AttemptError> {
        let query = Query::new().eq("id", identity_id);
        let read = select_one_as::<ProfileRow>(self.data.as_ref(), Collection::Profiles, query);

        match tokio::time::timeout(timeout, read).await {
            Err(_) => Err(AttemptError::Timeout),
            Ok(Err(err)) => Err(AttemptError::Backend(err)),
            Ok(Ok(None)) => Err(AttemptError::Missing),
            Ok(Ok(Some(row))) => Ok(row.into()),
        }
    }
}
