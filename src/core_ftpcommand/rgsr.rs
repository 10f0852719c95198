use crate::core_ftpcommand::context::CommandContext;
use log::{error, warn};

/// Handles the RGSR (register) command: `RGSR <login> <password>`.
///
/// Works in any authentication state and does not touch the session.
pub async fn handle_rgsr_command(ctx: &CommandContext, args: &[String]) -> Result<(), std::io::Error> {
    let (login, password) = match args {
        [login, password] => (login, password),
        _ => {
            warn!("RGSR called with {} arguments", args.len());
            return ctx
                .reply(501, "Lack of arguments, usage: RGSR <login> <password>")
                .await;
        }
    };

    match ctx.accounts.register(login, password).await {
        Ok(()) => {
            ctx.reply(200, &format!("Successfully registered. Your login: {}", login))
                .await
        }
        Err(e) => {
            error!("Registration of {} failed: {}", login, e);
            let (code, message) = e.to_ftp_response();
            ctx.reply(code, &message).await
        }
    }
}
