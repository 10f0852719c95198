use crate::core_ftpcommand::context::CommandContext;

/// Handles the HELP command. Read-only.
pub async fn handle_help_command(ctx: &CommandContext) -> Result<(), std::io::Error> {
    let commands = ctx.session().available_commands().await;
    ctx.reply(200, &format!("Available commands: {}", commands.join(", ")))
        .await
}
