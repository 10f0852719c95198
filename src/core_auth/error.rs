// Error handling for accounts and the credential store
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Failed to read credential store: {0}")]
    CredentialReadError(String),

    #[error("Failed to write credential store: {0}")]
    CredentialWriteError(String),

    #[error("Failed to hash password: {0}")]
    HashError(String),

    #[error("Login already exists: {0}")]
    LoginExists(String),

    #[error("Invalid login: {0}")]
    InvalidLogin(String),

    #[error("Credential task failed: {0}")]
    TaskFailed(String),
}

impl AuthError {
    pub fn to_ftp_response(&self) -> (u16, String) {
        match self {
            AuthError::CredentialReadError(_) | AuthError::TaskFailed(_) => {
                (451, "Local server error.".to_string())
            }
            AuthError::CredentialWriteError(_) => {
                (451, "Server error, please try again later.".to_string())
            }
            AuthError::HashError(_) => (
                451,
                "Error generating password hash, maybe password is too long?".to_string(),
            ),
            AuthError::LoginExists(_) => (
                530,
                "Username exists, try again with different login.".to_string(),
            ),
            AuthError::InvalidLogin(_) => (
                501,
                "Invalid login, use 1-32 letters, digits, '.', '_' or '-'.".to_string(),
            ),
        }
    }
}
