//! CRUD screens over the data service. Each screen takes the data facade and
//! the acting identity and never touches the authentication state; row-level
//! security on the service decides what the identity may actually see.

pub mod activities;
pub mod announcements;
pub mod approvals;
pub mod attendance;
pub mod finance;
pub mod progress;
pub mod scouts;

use crate::backend::BackendError;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ScreenError {
    /// Form input rejected before any call was made.
    #[error("{0}")]
    Invalid(String),
    #[error("You must be signed in.")]
    Unauthenticated,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ScreenError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Trimmed text, or `message` as a validation error when blank.
pub(crate) fn required(value: &str, message: &str) -> Result<String, ScreenError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ScreenError::invalid(message))
    } else {
        Ok(trimmed.to_string())
    }
}
