use crate::core_ftpcommand::context::CommandContext;
use crate::session::AuthState;
use log::{error, info, warn};

/// Handles the PASS command.
///
/// A wrong password keeps the pending login, so the client may retry PASS
/// without repeating USER.
pub async fn handle_pass_command(ctx: &CommandContext, args: &[String]) -> Result<(), std::io::Error> {
    let session = ctx.session();

    let (auth_state, login) = {
        let state = session.lock().await;
        (state.auth_state(), state.login.clone())
    };
    if auth_state == AuthState::Authenticated {
        return ctx.reply(435, "You are already logged in..").await;
    }

    let password = match args {
        [password] => password,
        [] => return ctx.reply(501, "No password provided, try again.").await,
        _ => return ctx.reply(501, "Use one password..").await,
    };

    if auth_state != AuthState::LoginPending {
        return ctx.reply(503, "No user specified, send USER first.").await;
    }

    match ctx.accounts.verify(&login, password).await {
        Ok(true) => {
            {
                let mut state = session.lock().await;
                state.authenticated = true;
            }
            info!("User {} logged in", login);
            ctx.reply(230, "User logged in, proceed.").await?;
            session.request_help_refresh().await;
            Ok(())
        }
        Ok(false) => {
            warn!("Failed password attempt for {}", login);
            ctx.reply(530, "Not logged in.").await
        }
        Err(e) => {
            error!("Failed to load credentials for PASS: {}", e);
            let (code, message) = e.to_ftp_response();
            ctx.reply(code, &message).await
        }
    }
}
