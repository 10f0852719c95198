use serde::{Deserialize, Serialize};

/// One entry of the credential file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    login: String,
    #[serde(rename = "password")]
    hashed_password: String,
}

impl Credential {
    pub fn new(login: &str, hashed_password: String) -> Self {
        Self {
            login: login.to_string(),
            hashed_password,
        }
    }

    pub fn get_hashed_password(&self) -> &str {
        &self.hashed_password
    }

    pub fn get_login(&self) -> &str {
        &self.login
    }
}

/// True when no record in `records` already uses `login`.
pub fn is_login_unique(records: &[Credential], login: &str) -> bool {
    records.iter().all(|record| record.login != login)
}
