//! Saved sign-in for the terminal client.
//!
//! One JSON file holds the last signed-in user and token so the next run can
//! skip sign-in. Signing out removes it. The chat components never touch the
//! file; they only see the [`Credentials`] restored from it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::auth::{AuthToken, Credentials};
use crate::error::ChatResult;

/// Environment variable overriding the credentials file location.
pub const CREDENTIALS_FILE_ENV: &str = "JAMIE_CREDENTIALS_FILE";

#[derive(Debug, Serialize, Deserialize)]
struct SavedCredentials {
    user_id: String,
    token: String,
}

/// File-backed store for the signed-in user's credentials.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location: `$JAMIE_CREDENTIALS_FILE`, else
    /// `<config dir>/jamie/credentials.json`.
    ///
    /// Returns `None` when no config directory can be determined.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        std::env::var(CREDENTIALS_FILE_ENV)
            .ok()
            .filter(|raw| !raw.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|dir| dir.join("jamie").join("credentials.json")))
    }

    /// File this store reads and writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the saved credentials.
    ///
    /// A missing, empty or unreadable-as-JSON file yields `Ok(None)`; the
    /// user then simply signs in again.
    ///
    /// # Errors
    /// Returns [`ChatError::Io`](crate::error::ChatError::Io) if the file
    /// exists but cannot be read.
    pub async fn load(&self) -> ChatResult<Option<Credentials>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }

        match serde_json::from_str::<SavedCredentials>(&content) {
            Ok(saved) if !saved.user_id.is_empty() && !saved.token.is_empty() => {
                Ok(Some(Credentials::new(saved.user_id, AuthToken::new(saved.token))))
            }
            Ok(_) => Ok(None),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "ignoring unreadable credentials file: {e}");
                Ok(None)
            }
        }
    }

    /// Write `credentials`, creating the parent directory if needed.
    ///
    /// # Errors
    /// Returns [`ChatError::Io`](crate::error::ChatError::Io) on write failure.
    pub async fn save(&self, credentials: &Credentials) -> ChatResult<()> {
        let parent = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = parent {
            tokio::fs::create_dir_all(parent).await?;
        }

        let saved = SavedCredentials {
            user_id: credentials.user_id().to_string(),
            token: credentials.token().expose().to_string(),
        };
        let json = serde_json::to_string_pretty(&saved).map_err(std::io::Error::from)?;
        tokio::fs::write(&self.path, json).await?;
        restrict_permissions(&self.path).await?;

        tracing::debug!(path = %self.path.display(), "credentials saved");
        Ok(())
    }

    /// Remove the saved credentials; a missing file is not an error.
    ///
    /// # Errors
    /// Returns [`ChatError::Io`](crate::error::ChatError::Io) if the file
    /// exists but cannot be removed.
    pub async fn clear(&self) -> ChatResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "credentials removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
