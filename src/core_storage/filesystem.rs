use crate::core_storage::error::StorageError;
use log::{debug, error, info};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Flat file storage used by LIST, RETR and STOR.
pub trait FileStore: Send + Sync {
    fn list(&self) -> Result<Vec<String>, StorageError>;
    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError>;
    fn write(&self, name: &str, data: &[u8]) -> Result<(), StorageError>;
}

/// Files stored directly under a single root directory.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root)
                .map_err(|e| StorageError::WriteError(format!("{}: {}", root.display(), e)))?;
            info!("Created storage root {}", root.display());
        }
        Ok(Self { root })
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        if is_valid_file_name(name) {
            Ok(self.root.join(name))
        } else {
            Err(StorageError::InvalidName(name.to_string()))
        }
    }
}

/// Only bare names are accepted, the store has no directories.
pub fn is_valid_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

impl FileStore for LocalFileStore {
    fn list(&self) -> Result<Vec<String>, StorageError> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| StorageError::ListError(format!("{}: {}", self.root.display(), e)))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::ListError(e.to_string()))?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if is_file {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self
            .resolve(name)
            .map_err(|_| StorageError::NotFound(name.to_string()))?;
        match fs::read(&path) {
            Ok(data) => {
                debug!("Read {} bytes from {:?}", data.len(), path);
                Ok(data)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => {
                error!("Failed to read {:?}: {}", path, e);
                Err(StorageError::ReadError(name.to_string()))
            }
        }
    }

    fn write(&self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(name)?;
        fs::write(&path, data).map_err(|e| {
            error!("Failed to write {:?}: {}", path, e);
            StorageError::WriteError(name.to_string())
        })?;
        debug!("Wrote {} bytes to {:?}", data.len(), path);
        Ok(())
    }
}
