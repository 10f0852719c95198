use crate::core_auth::core_auth::Credential;
use crate::core_auth::error::AuthError;
use log::{debug, info};
use std::fs;
use std::path::PathBuf;

/// Persistence for the credential records.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Vec<Credential>, AuthError>;
    fn save(&self, records: &[Credential]) -> Result<(), AuthError>;
}

/// Credentials kept as a JSON array of `{"login", "password"}` objects.
#[derive(Debug)]
pub struct JsonCredentialStore {
    path: PathBuf,
}

impl JsonCredentialStore {
    /// Opens the store, creating an empty file (and its parent directories) on first run.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AuthError> {
        let path = path.into();
        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| {
                    AuthError::CredentialWriteError(format!("{}: {}", parent.display(), e))
                })?;
            }
            fs::write(&path, "[]").map_err(|e| {
                AuthError::CredentialWriteError(format!("{}: {}", path.display(), e))
            })?;
            info!("Created empty credential store at {}", path.display());
        }
        Ok(Self { path })
    }
}

impl CredentialStore for JsonCredentialStore {
    fn load(&self) -> Result<Vec<Credential>, AuthError> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            AuthError::CredentialReadError(format!("{}: {}", self.path.display(), e))
        })?;
        let records: Vec<Credential> = serde_json::from_str(&content).map_err(|e| {
            AuthError::CredentialReadError(format!("{}: {}", self.path.display(), e))
        })?;
        debug!("Loaded {} credential records", records.len());
        Ok(records)
    }

    fn save(&self, records: &[Credential]) -> Result<(), AuthError> {
        let content = serde_json::to_string_pretty(records)
            .map_err(|e| AuthError::CredentialWriteError(e.to_string()))?;
        fs::write(&self.path, content).map_err(|e| {
            AuthError::CredentialWriteError(format!("{}: {}", self.path.display(), e))
        })?;
        debug!("Saved {} credential records", records.len());
        Ok(())
    }
}
