use crate::core_ftpcommand::context::CommandContext;
use log::{error, info};

/// Handles the QUIT command.
///
/// Sends the closing acknowledgement, signs the session out and signals the
/// command loop to stop. Repeating it is harmless: the stop signal can only
/// fire once.
pub async fn handle_quit_command(ctx: &CommandContext) -> Result<(), std::io::Error> {
    info!("Received QUIT command from connection {}", ctx.client.id);

    let sent = ctx.reply(221, "Connection closed.").await;
    if let Err(e) = &sent {
        error!("Failed to send QUIT response: {}", e);
    }

    ctx.session().sign_out().await;
    sent
}
