use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "duoftpd",
    about = "A file-transfer server with a passive data channel and a help side-channel."
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Control port, overrides the configuration file
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Help side-channel port, overrides the configuration file
    #[arg(long)]
    pub help_port: Option<u16>,

    /// Storage root directory, overrides the configuration file
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Enable verbose mode
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn apply_overrides(&self, config: &mut crate::Config) {
        if let Some(port) = self.port {
            config.server.listen_port = port;
        }
        if let Some(help_port) = self.help_port {
            config.server.help_port = help_port;
        }
        if let Some(root) = &self.root {
            config.server.storage_root = root.clone();
        }
    }
}
