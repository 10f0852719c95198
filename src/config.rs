use anyhow::{bail, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server_name: String,
    pub bind_address: String,
    pub listen_port: u16,
    pub help_port: u16,
    /// Public IPv4 announced in PASV replies. Falls back to the local address
    /// of the control connection.
    pub pasv_address: Option<String>,
    pub storage_root: PathBuf,
    pub credentials_file: PathBuf,
    pub metadata_file: PathBuf,
    pub bcrypt_cost: u32,
    pub pasv_accept_timeout_secs: u64,
    pub data_connect_grace_ms: u64,
    pub stor_read_timeout_secs: u64,
    pub help_push_interval_secs: u64,
    pub upload_buffer_size: usize,
    pub download_buffer_size: usize,
    pub ansi_replies: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_name: String::from("duoftpd"),
            bind_address: String::from("0.0.0.0"),
            listen_port: 2121,
            help_port: 2222,
            pasv_address: None,
            storage_root: PathBuf::from("data/files"),
            credentials_file: PathBuf::from("data/users.json"),
            metadata_file: PathBuf::from("data/filesystem.json"),
            bcrypt_cost: 10,
            pasv_accept_timeout_secs: 120,
            data_connect_grace_ms: 2000,
            stor_read_timeout_secs: 30,
            help_push_interval_secs: 15,
            upload_buffer_size: 64 * 1024,
            download_buffer_size: 64 * 1024,
            ansi_replies: false,
        }
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let server = &self.server;

        if !(4..=31).contains(&server.bcrypt_cost) {
            bail!("bcrypt_cost must be between 4 and 31, got {}", server.bcrypt_cost);
        }
        if server.listen_port != 0 && server.listen_port == server.help_port {
            bail!("listen_port and help_port must differ");
        }
        if server.upload_buffer_size == 0 || server.download_buffer_size == 0 {
            bail!("transfer buffer sizes must be greater than 0");
        }
        if server.help_push_interval_secs == 0 {
            bail!("help_push_interval_secs must be greater than 0");
        }
        server
            .bind_address
            .parse::<IpAddr>()
            .with_context(|| format!("Invalid bind_address: {}", server.bind_address))?;
        if let Some(pasv) = &server.pasv_address {
            pasv.parse::<Ipv4Addr>()
                .with_context(|| format!("pasv_address must be an IPv4 address: {}", pasv))?;
        }
        Ok(())
    }
}

impl ServerConfig {
    pub fn control_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.listen_port)
    }

    pub fn help_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.help_port)
    }

    pub fn pasv_ip(&self) -> Option<Ipv4Addr> {
        self.pasv_address.as_deref().and_then(|ip| ip.parse().ok())
    }

    pub fn pasv_accept_timeout(&self) -> Duration {
        Duration::from_secs(self.pasv_accept_timeout_secs)
    }

    pub fn data_connect_grace(&self) -> Duration {
        Duration::from_millis(self.data_connect_grace_ms)
    }

    pub fn stor_read_timeout(&self) -> Duration {
        Duration::from_secs(self.stor_read_timeout_secs)
    }

    pub fn help_push_interval(&self) -> Duration {
        Duration::from_secs(self.help_push_interval_secs)
    }
}

// Helper function to log configuration options
pub fn log_config(config: &Config) {
    let server = &config.server;
    info!("  Control Socket: {}", server.control_socket());
    info!("  Help Socket: {}", server.help_socket());
    info!(
        "  PASV Address: {}",
        server.pasv_address.as_deref().unwrap_or("<control connection address>")
    );
    info!("  Storage Root: {}", server.storage_root.display());
    info!("  Credentials File: {}", server.credentials_file.display());
    info!("  Metadata File: {}", server.metadata_file.display());
    info!("  Upload Buffer Size: {} KB", server.upload_buffer_size / 1024);
    info!("  Download Buffer Size: {} KB", server.download_buffer_size / 1024);
}
