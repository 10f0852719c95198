use crate::core_ftpcommand::context::CommandContext;

pub async fn handle_echo_command(ctx: &CommandContext, args: &[String]) -> Result<(), std::io::Error> {
    ctx.reply(200, &args.join(" ")).await
}

pub async fn handle_hllo_command(ctx: &CommandContext) -> Result<(), std::io::Error> {
    ctx.reply(200, "Hello").await
}
