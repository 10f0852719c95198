use crate::constants::LOGIN_REGEX;
use crate::core_auth::core_auth::{is_login_unique, Credential};
use crate::core_auth::error::AuthError;
use crate::core_auth::helper::{hash_password, verify_password};
use crate::core_auth::store::CredentialStore;
use log::{error, info};
use regex::Regex;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Login lookup, password verification and registration on top of a
/// [`CredentialStore`].
pub struct Accounts {
    store: Arc<dyn CredentialStore>,
    cost: u32,
    login_pattern: Regex,
    // Serializes load/check/save so two registrations cannot both pass the
    // uniqueness check.
    register_lock: Mutex<()>,
}

impl Accounts {
    pub fn new(store: Arc<dyn CredentialStore>, cost: u32) -> Self {
        Self {
            store,
            cost,
            login_pattern: Regex::new(LOGIN_REGEX).expect("LOGIN_REGEX is a valid pattern"),
            register_lock: Mutex::new(()),
        }
    }

    pub async fn lookup(&self, login: &str) -> Result<Option<Credential>, AuthError> {
        if login.is_empty() {
            return Ok(None);
        }
        let store = Arc::clone(&self.store);
        let login = login.to_string();
        tokio::task::spawn_blocking(move || find_record(store.as_ref(), &login))
            .await
            .map_err(|e| AuthError::TaskFailed(e.to_string()))?
    }

    /// Returns `Ok(false)` for an unknown login or a wrong password.
    pub async fn verify(&self, login: &str, password: &str) -> Result<bool, AuthError> {
        if login.is_empty() {
            return Ok(false);
        }
        let store = Arc::clone(&self.store);
        let login = login.to_string();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || {
            let matched = find_record(store.as_ref(), &login)?
                .map(|record| verify_password(&password, record.get_hashed_password()))
                .unwrap_or(false);
            Ok::<bool, AuthError>(matched)
        })
        .await
        .map_err(|e| {
            error!("Password verification task failed: {}", e);
            AuthError::TaskFailed(e.to_string())
        })?
    }

    pub async fn register(&self, login: &str, password: &str) -> Result<(), AuthError> {
        if !self.login_pattern.is_match(login) {
            return Err(AuthError::InvalidLogin(login.to_string()));
        }

        let _guard = self.register_lock.lock().await;

        let store = Arc::clone(&self.store);
        let cost = self.cost;
        let new_login = login.to_string();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || {
            let mut records = store.load()?;
            if !is_login_unique(&records, &new_login) {
                return Err(AuthError::LoginExists(new_login));
            }
            let hashed = hash_password(&password, cost)?;
            records.push(Credential::new(&new_login, hashed));
            store.save(&records)
        })
        .await
        .map_err(|e| AuthError::TaskFailed(e.to_string()))??;

        info!("New user registered: {}", login);
        Ok(())
    }
}

fn find_record(store: &dyn CredentialStore, login: &str) -> Result<Option<Credential>, AuthError> {
    let records = store.load()?;
    Ok(records.into_iter().find(|r| r.get_login() == login))
}
