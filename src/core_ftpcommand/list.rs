use crate::core_ftpcommand::context::CommandContext;
use crate::core_ftpcommand::utils::{acquire_data_connection, format_file_list, require_login};
use crate::helpers::format_reply;
use log::{error, info};
use tokio::io::AsyncWriteExt;

/// Handles the LIST command.
///
/// Sends the listing of the storage root over the data connection, which is
/// closed afterwards whatever the outcome.
pub async fn handle_list_command(ctx: &CommandContext) -> Result<(), std::io::Error> {
    if !require_login(ctx).await? {
        return Ok(());
    }

    let Some(mut data_stream) = acquire_data_connection(ctx).await? else {
        return Ok(());
    };

    let files = match ctx.list_files().await {
        Ok(files) => files,
        Err(e) => {
            error!("Failed to list storage root: {}", e);
            let (code, message) = e.to_ftp_response();
            return ctx.reply(code, &message).await;
        }
    };

    ctx.reply(150, "Here comes the directory listing.").await?;

    let payload = if files.is_empty() {
        format_reply(226, "Directory is empty.", false)
    } else {
        format_file_list(&files)
    };

    let sent = async {
        data_stream.write_all(payload.as_bytes()).await?;
        data_stream.shutdown().await
    }
    .await;
    drop(data_stream);

    match sent {
        Ok(()) => {
            info!("Sent listing of {} files to connection {}", files.len(), ctx.client.id);
            ctx.reply(226, "Directory send OK.").await
        }
        Err(e) => {
            error!("Error sending listing over data connection: {}", e);
            ctx.reply(426, "Connection closed due to network error.").await
        }
    }
}
