use crate::core_ftpcommand::context::CommandContext;
use tokio::net::TcpStream;

/// Formats a directory listing, one `ls -l`-style line per file. Permissions,
/// owner and size are placeholders.
pub fn format_file_list(files: &[String]) -> String {
    files
        .iter()
        .map(|name| format!("-rw-r--r-- 1 owner group 0 Jan 01 00:00 {}\r\n", name))
        .collect()
}

/// Shared precondition of LIST, RETR and STOR: an authenticated session.
pub async fn require_login(ctx: &CommandContext) -> Result<bool, std::io::Error> {
    if ctx.session().is_authenticated().await {
        Ok(true)
    } else {
        ctx.reply(530, "Not logged in.").await?;
        Ok(false)
    }
}

/// Takes the session's data connection, replying with the precondition error
/// when there is none.
pub async fn acquire_data_connection(
    ctx: &CommandContext,
) -> Result<Option<TcpStream>, std::io::Error> {
    let grace = ctx.config.server.data_connect_grace();
    match ctx.session().take_data_connection(grace).await {
        Ok(stream) => Ok(Some(stream)),
        Err(e) => {
            let (code, message) = e.to_ftp_response();
            ctx.reply(code, message).await?;
            Ok(None)
        }
    }
}
