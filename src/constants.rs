// src/constants.rs

pub const LOGIN_REGEX: &str = r"^[A-Za-z0-9._-]{1,32}$";

/// bcrypt silently ignores everything past this many bytes.
pub const BCRYPT_MAX_PASSWORD_BYTES: usize = 72;

pub const BASE_COMMANDS: [&str; 7] = ["help", "echo", "hllo", "rgsr", "user", "pass", "quit"];
pub const SESSION_COMMANDS: [&str; 4] = ["pasv", "list", "retr", "stor"];

/// Longest control line accepted, terminator included.
pub const MAX_COMMAND_LENGTH: usize = 4096;

pub const DEFAULT_CONFIG_PATH: &str = "etc/duoftpd.toml";
