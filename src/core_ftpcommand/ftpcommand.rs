#[derive(Eq, Hash, PartialEq, Debug, Clone, Copy)]
pub enum FtpCommand {
    ECHO,
    HLLO,
    RGSR,
    USER,
    PASS,
    QUIT,
    HELP,
    PASV,
    LIST,
    RETR,
    STOR,
}

impl FtpCommand {
    pub fn parse(verb: &str) -> Option<FtpCommand> {
        match verb.to_ascii_uppercase().as_str() {
            "ECHO" => Some(FtpCommand::ECHO),
            "HLLO" => Some(FtpCommand::HLLO),
            "RGSR" => Some(FtpCommand::RGSR),
            "USER" => Some(FtpCommand::USER),
            "PASS" => Some(FtpCommand::PASS),
            "QUIT" => Some(FtpCommand::QUIT),
            "HELP" => Some(FtpCommand::HELP),
            "PASV" => Some(FtpCommand::PASV),
            "LIST" => Some(FtpCommand::LIST),
            "RETR" => Some(FtpCommand::RETR),
            "STOR" => Some(FtpCommand::STOR),
            _ => None,
        }
    }

    /// Transfer commands consume the data channel; every other command
    /// discards a lingering one before running.
    pub fn uses_data_channel(self) -> bool {
        matches!(self, FtpCommand::LIST | FtpCommand::RETR | FtpCommand::STOR)
    }
}

/// A tokenized control line: upper-cased verb plus positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub verb: String,
    pub args: Vec<String>,
}

/// Trims and splits a line on whitespace. No quoting or escaping.
/// Returns `None` for blank lines.
pub fn parse_command_line(line: &str) -> Option<CommandLine> {
    let mut parts = line.split_whitespace();
    let verb = parts.next()?.to_ascii_uppercase();
    let args = parts.map(str::to_string).collect();
    Some(CommandLine { verb, args })
}
