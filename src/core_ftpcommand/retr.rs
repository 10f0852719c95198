use crate::core_ftpcommand::context::CommandContext;
use crate::core_ftpcommand::utils::{acquire_data_connection, require_login};
use log::{error, info, warn};
use tokio::io::AsyncWriteExt;

/// Handles the RETR (Retrieve) command.
///
/// A missing file is reported before the data connection is touched, so the
/// client may retry with another name on the same channel.
///
/// # Arguments
///
/// * `ctx` - The command context of the calling connection.
/// * `args` - Exactly one argument, the file name.
///
/// # Returns
///
/// Result<(), std::io::Error> indicating whether the control connection is still usable.
pub async fn handle_retr_command(ctx: &CommandContext, args: &[String]) -> Result<(), std::io::Error> {
    let [filename] = args else {
        warn!("RETR command received with {} arguments", args.len());
        return ctx
            .reply(501, "Syntax error in parameters or arguments. Usage: RETR <filename>")
            .await;
    };

    if !require_login(ctx).await? {
        return Ok(());
    }

    let data = match ctx.read_file(filename).await {
        Ok(data) => data,
        Err(e) => {
            warn!("RETR of {} failed: {}", filename, e);
            let (code, message) = e.to_ftp_response();
            return ctx.reply(code, &message).await;
        }
    };

    let Some(mut data_stream) = acquire_data_connection(ctx).await? else {
        return Ok(());
    };

    ctx.reply(150, &format!("Opening data connection for {}.", filename))
        .await?;

    let chunk_size = ctx.config.server.download_buffer_size;
    let sent = async {
        let mut total = 0usize;
        for chunk in data.chunks(chunk_size) {
            data_stream.write_all(chunk).await?;
            total += chunk.len();
        }
        data_stream.shutdown().await?;
        Ok::<usize, std::io::Error>(total)
    }
    .await;
    drop(data_stream);

    match sent {
        Ok(total) => {
            info!("File transfer completed successfully: {} ({} bytes)", filename, total);
            ctx.reply(
                226,
                &format!("Transfer complete. Total bytes sent: {}.", total),
            )
            .await
        }
        Err(e) => {
            error!("Error sending {} to client: {}", filename, e);
            ctx.reply(426, &format!("Connection closed; transfer aborted: {}", e))
                .await
        }
    }
}
