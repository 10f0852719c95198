pub mod accounts;
pub mod core_auth;
pub mod error;
pub mod helper;
pub mod store;

pub use accounts::Accounts;
pub use store::JsonCredentialStore;
