// Here's the list of the commands implemented
pub mod echo;
pub mod help;
pub mod list;
pub mod pass;
pub mod quit;
pub mod retr;
pub mod rgsr;
pub mod stor;
pub mod user;

pub mod ftpcommand;
pub mod handlers;

// The utils and common functions are here
pub mod context;
pub mod utils;

pub use context::CommandContext;
pub use ftpcommand::FtpCommand;
