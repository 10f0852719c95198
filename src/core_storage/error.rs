// Error handling for the file store
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("Failed to list storage root: {0}")]
    ListError(String),

    #[error("Failed to read file: {0}")]
    ReadError(String),

    #[error("Failed to write file: {0}")]
    WriteError(String),

    #[error("Failed to update metadata index: {0}")]
    IndexError(String),
}

impl StorageError {
    pub fn to_ftp_response(&self) -> (u16, String) {
        match self {
            StorageError::NotFound(name) | StorageError::ReadError(name) => {
                (550, format!("File not found or access denied: {}", name))
            }
            StorageError::InvalidName(name) => (550, format!("Invalid file name: {}", name)),
            StorageError::ListError(_) => (550, "Could not list directory.".to_string()),
            StorageError::WriteError(name) => (550, format!("Could not write file: {}", name)),
            StorageError::IndexError(_) => (
                451,
                "Requested action aborted. Local error in processing.".to_string(),
            ),
        }
    }
}
