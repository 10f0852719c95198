use crate::core_ftpcommand::context::CommandContext;
use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_ftpcommand::{echo, help, list, pass, quit, retr, rgsr, stor, user};
use crate::core_network::pasv;
use log::trace;

/// Runs one command against the session.
///
/// An `Err` means the control connection itself failed; every protocol-level
/// failure is reported to the client and returns `Ok`.
pub async fn dispatch(
    command: FtpCommand,
    ctx: &CommandContext,
    args: &[String],
) -> Result<(), std::io::Error> {
    if !command.uses_data_channel() {
        trace!("Discarding lingering data channel before {:?}", command);
        ctx.session().close_data_connection().await;
    }

    match command {
        FtpCommand::ECHO => echo::handle_echo_command(ctx, args).await,
        FtpCommand::HLLO => echo::handle_hllo_command(ctx).await,
        FtpCommand::RGSR => rgsr::handle_rgsr_command(ctx, args).await,
        FtpCommand::USER => user::handle_user_command(ctx, args).await,
        FtpCommand::PASS => pass::handle_pass_command(ctx, args).await,
        FtpCommand::QUIT => quit::handle_quit_command(ctx).await,
        FtpCommand::HELP => help::handle_help_command(ctx).await,
        FtpCommand::PASV => pasv::handle_pasv_command(ctx).await,
        FtpCommand::LIST => list::handle_list_command(ctx).await,
        FtpCommand::RETR => retr::handle_retr_command(ctx, args).await,
        FtpCommand::STOR => stor::handle_stor_command(ctx, args).await,
    }
}

/// Reply for verbs outside [`FtpCommand`].
pub async fn handle_unknown_command(ctx: &CommandContext, verb: &str) -> Result<(), std::io::Error> {
    trace!("Unknown command {}", verb);
    ctx.reply(502, "Command not implemented.").await
}
