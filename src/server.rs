use crate::config::log_config;
use crate::core_auth::{Accounts, JsonCredentialStore};
use crate::core_network::help::run_help_listener;
use crate::core_network::network;
use crate::core_network::ConnectionRegistry;
use crate::core_storage::metadata::initialize_storage;
use crate::core_storage::{FileStore, LocalFileStore, MetadataIndex};
use crate::Config;
use anyhow::{Context, Result};
use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Process-wide collaborators shared by every connection.
#[derive(Clone)]
pub struct Services {
    pub config: Arc<Config>,
    pub registry: Arc<ConnectionRegistry>,
    pub accounts: Arc<Accounts>,
    pub files: Arc<dyn FileStore>,
    pub index: Arc<MetadataIndex>,
}

impl Services {
    /// Opens the credential store, the file store and the metadata index
    /// described by `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        let server = &config.server;

        let credentials = JsonCredentialStore::open(&server.credentials_file)
            .context("Failed to open credential store")?;
        let files = LocalFileStore::open(&server.storage_root)
            .context("Failed to open storage root")?;
        let index = MetadataIndex::new(&server.storage_root, &server.metadata_file);
        initialize_storage(&index).context("Failed to initialize metadata index")?;

        let accounts = Accounts::new(Arc::new(credentials), server.bcrypt_cost);

        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(ConnectionRegistry::new()),
            accounts: Arc::new(accounts),
            files: Arc::new(files),
            index: Arc::new(index),
        })
    }
}

/// Bound control and help listeners, ready to serve.
pub struct Server {
    control: TcpListener,
    help: TcpListener,
    services: Services,
}

impl Server {
    pub async fn bind(services: Services) -> Result<Self> {
        let server = &services.config.server;
        let control = TcpListener::bind(server.control_socket())
            .await
            .with_context(|| format!("Failed to bind control port {}", server.control_socket()))?;
        let help = TcpListener::bind(server.help_socket())
            .await
            .with_context(|| format!("Failed to bind help port {}", server.help_socket()))?;
        Ok(Self {
            control,
            help,
            services,
        })
    }

    pub fn control_addr(&self) -> Result<SocketAddr> {
        Ok(self.control.local_addr()?)
    }

    pub fn help_addr(&self) -> Result<SocketAddr> {
        Ok(self.help.local_addr()?)
    }

    /// Runs the help side-channel in the background and the control acceptor
    /// on the current task.
    pub async fn serve(self) -> Result<()> {
        info!("Help side-channel listening on {}", self.help_addr()?);
        tokio::spawn(run_help_listener(
            self.help,
            Arc::clone(&self.services.registry),
            self.services.config.server.help_push_interval(),
        ));
        network::start_server(self.control, self.services).await
    }
}

/// Runs the server with the provided configuration.
///
/// # Arguments
///
/// * `config` - The server configuration.
///
/// # Returns
///
/// Result<(), anyhow::Error> indicating the success or failure of the operation.
pub async fn run(config: Config) -> Result<()> {
    info!("Starting server with config:");
    log_config(&config);

    let services = Services::from_config(config)?;
    let server = Server::bind(services).await?;
    info!("Control channel bound to {}", server.control_addr()?);

    if let Err(e) = server.serve().await {
        error!("Failed to start server: {}", e);
        return Err(e);
    }
    Ok(())
}
