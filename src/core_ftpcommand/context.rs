use crate::core_auth::Accounts;
use crate::core_storage::error::StorageError;
use crate::core_storage::{FileStore, MetadataIndex};
use crate::helpers::{format_reply, send_response};
use crate::session::{Client, ControlWriter, Session};
use crate::Config;
use std::sync::Arc;

/// Everything a command handler may touch.
#[derive(Clone)]
pub struct CommandContext {
    pub client: Arc<Client>,
    pub config: Arc<Config>,
    pub accounts: Arc<Accounts>,
    pub files: Arc<dyn FileStore>,
    pub index: Arc<MetadataIndex>,
}

impl CommandContext {
    pub fn session(&self) -> &Arc<Session> {
        &self.client.session
    }

    pub fn writer(&self) -> &ControlWriter {
        &self.client.writer
    }

    pub async fn reply(&self, code: u16, message: &str) -> Result<(), std::io::Error> {
        let reply = format_reply(code, message, self.config.server.ansi_replies);
        send_response(self.writer(), reply.as_bytes()).await
    }

    // The stores do blocking filesystem I/O, keep it off the runtime workers.

    pub async fn list_files(&self) -> Result<Vec<String>, StorageError> {
        let files = Arc::clone(&self.files);
        run_blocking(move || files.list(), StorageError::ListError).await
    }

    pub async fn read_file(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let files = Arc::clone(&self.files);
        let name = name.to_string();
        run_blocking(move || files.read(&name), StorageError::ReadError).await
    }

    pub async fn write_file(&self, name: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let files = Arc::clone(&self.files);
        let name = name.to_string();
        run_blocking(move || files.write(&name, &data), StorageError::WriteError).await
    }

    /// Rescans the storage root into the metadata index.
    pub async fn refresh_index(&self) -> Result<(), StorageError> {
        let index = Arc::clone(&self.index);
        run_blocking(move || index.refresh().map(|_| ()), StorageError::IndexError).await
    }
}

async fn run_blocking<T, F>(
    work: F,
    on_failure: fn(String) -> StorageError,
) -> Result<T, StorageError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| on_failure(e.to_string()))?
}
