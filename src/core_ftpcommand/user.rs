use crate::core_ftpcommand::context::CommandContext;
use log::{error, info, warn};

/// Handles the USER command.
///
/// Records the login as pending when it exists in the credential store. Any
/// attempt, successful or not, first forgets the previously pending login.
///
/// # Arguments
///
/// * `ctx` - The command context of the calling connection.
/// * `args` - Exactly one argument, the login.
///
/// # Returns
///
/// Result<(), std::io::Error> indicating whether the reply could be sent.
pub async fn handle_user_command(ctx: &CommandContext, args: &[String]) -> Result<(), std::io::Error> {
    let session = ctx.session();

    if session.is_authenticated().await {
        return ctx.reply(435, "You are already logged in..").await;
    }

    let login = match args {
        [login] => login,
        [] => return ctx.reply(501, "No username provided, try again.").await,
        _ => return ctx.reply(501, "Use one username..").await,
    };

    info!("Received USER command with username: {}", login);
    session.lock().await.login.clear();

    match ctx.accounts.lookup(login).await {
        Ok(Some(_)) => {
            session.lock().await.login = login.clone();
            ctx.reply(331, "User okay, need password.").await
        }
        Ok(None) => {
            warn!("Unknown login attempted: {}", login);
            ctx.reply(332, "Need account for login.").await
        }
        Err(e) => {
            error!("Failed to load credentials for USER: {}", e);
            let (code, message) = e.to_ftp_response();
            ctx.reply(code, &message).await
        }
    }
}
