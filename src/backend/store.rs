//! On-disk persistence for the current session so a restarted portal can
//! restore it. The file holds raw tokens: it is created owner-only on unix
//! and removed on sign-out.

use super::{BackendError, Identity, Session};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{io::ErrorKind, path::PathBuf};
use tokio::{fs, io::AsyncWriteExt};

#[derive(Serialize, Deserialize)]
struct StoredSession {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
    user: Identity,
}

#[derive(Clone, Debug)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Reads the stored session, `None` when no file exists.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or decoded.
    pub async fn load(&self) -> Result<Option<Session>, BackendError> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(BackendError::Config(format!(
                    "Failed to read session file {}: {err}",
                    self.path.display()
                )));
            }
        };

        let stored: StoredSession = serde_json::from_slice(&raw)
            .map_err(|err| BackendError::Parse(format!("Invalid session file: {err}")))?;

        Ok(Some(Session {
            access_token: SecretString::from(stored.access_token),
            refresh_token: SecretString::from(stored.refresh_token),
            expires_at: stored.expires_at,
            identity: stored.user,
        }))
    }

    /// Replaces the stored session.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, session: &Session) -> Result<(), BackendError> {
        let stored = StoredSession {
            access_token: session.access_token.expose_secret().to_string(),
            refresh_token: session.refresh_token.expose_secret().to_string(),
            expires_at: session.expires_at,
            user: session.identity.clone(),
        };
        let payload = serde_json::to_vec(&stored)
            .map_err(|err| BackendError::Serialization(format!("Failed to encode session: {err}")))?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let write_error = |err: std::io::Error| {
            BackendError::Config(format!(
                "Failed to write session file {}: {err}",
                self.path.display()
            ))
        };

        let mut file = options.open(&self.path).await.map_err(write_error)?;
        file.write_all(&payload).await.map_err(write_error)?;
        file.flush().await.map_err(write_error)?;
        Ok(())
    }

    /// Removes the stored session; a missing file is not an error.
    ///
    /// # Errors
    /// Returns an error if an existing file cannot be removed.
    pub async fn clear(&self) -> Result<(), BackendError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(BackendError::Config(format!(
                "Failed to remove session file {}: {err}",
                self.path.display()
            ))),
        }
    }
}
