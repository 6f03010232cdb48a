use thiserror::Error;

/// Maximum number of error body characters surfaced to callers.
const MAX_ERROR_CHARS: usize = 200;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Request failed ({status}): {message}")]
    Http { status: u16, message: String },
    /// Credentials or refresh token refused by the auth service.
    #[error("{0}")]
    Rejected(String),
    #[error("Response error: {0}")]
    Parse(String),
    #[error("Request error: {0}")]
    Serialization(String),
}

impl BackendError {
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Maps transport errors into `BackendError` variants with timeout detection.
pub(crate) fn map_request_error(err: &reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout("Request timed out. Please try again.".to_string())
    } else {
        BackendError::Network(format!("Unable to reach the service: {err}"))
    }
}

/// Trims and truncates HTTP error bodies before they reach users.
pub(crate) fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}
