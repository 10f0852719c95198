use crate::core_ftpcommand::context::CommandContext;
use crate::core_ftpcommand::utils::{acquire_data_connection, require_login};
use log::{error, info, warn};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

enum ReceiveError {
    TimedOut,
    Io(std::io::Error),
}

/// Handles the STOR (Store File) command.
///
/// Reads the data connection until the peer closes it, bounded by the
/// configured read deadline, then writes the bytes to the file store. A
/// timeout discards everything received so far.
pub async fn handle_stor_command(ctx: &CommandContext, args: &[String]) -> Result<(), std::io::Error> {
    let [filename] = args else {
        warn!("STOR command received with {} arguments", args.len());
        return ctx
            .reply(501, "Syntax error in parameters or arguments. Usage: STOR <filename>")
            .await;
    };

    if !require_login(ctx).await? {
        return Ok(());
    }

    let Some(mut data_stream) = acquire_data_connection(ctx).await? else {
        return Ok(());
    };

    ctx.reply(150, &format!("Opening data connection for {}.", filename))
        .await?;

    let server = &ctx.config.server;
    let received = receive_all(
        &mut data_stream,
        server.upload_buffer_size,
        server.stor_read_timeout(),
    )
    .await;
    drop(data_stream);

    let buffer = match received {
        Ok(buffer) => buffer,
        Err(ReceiveError::TimedOut) => {
            warn!("STOR of {} timed out, discarding partial upload", filename);
            return ctx.reply(426, "Data connection timed out.").await;
        }
        Err(ReceiveError::Io(e)) => {
            error!("Error reading from data stream: {}", e);
            return ctx
                .reply(426, &format!("Connection closed; transfer aborted: {}", e))
                .await;
        }
    };

    let total = buffer.len();
    if let Err(e) = ctx.write_file(filename, buffer).await {
        error!("Failed to store {}: {}", filename, e);
        let (code, message) = e.to_ftp_response();
        return ctx.reply(code, &message).await;
    }

    info!("File stored successfully: {} ({} bytes)", filename, total);
    ctx.reply(
        226,
        &format!("Transfer complete. Total bytes received: {}.", total),
    )
    .await?;

    if let Err(e) = ctx.refresh_index().await {
        warn!("Failed to refresh metadata index after STOR: {}", e);
    }
    Ok(())
}

async fn receive_all(
    data_stream: &mut TcpStream,
    buffer_size: usize,
    deadline: Duration,
) -> Result<Vec<u8>, ReceiveError> {
    let read_loop = async {
        let mut received = Vec::new();
        let mut buffer = vec![0; buffer_size];
        loop {
            let bytes_read = data_stream.read(&mut buffer).await?;
            if bytes_read == 0 {
                return Ok::<Vec<u8>, std::io::Error>(received);
            }
            received.extend_from_slice(&buffer[..bytes_read]);
        }
    };

    match tokio::time::timeout(deadline, read_loop).await {
        Ok(Ok(received)) => Ok(received),
        Ok(Err(e)) => Err(ReceiveError::Io(e)),
        Err(_) => Err(ReceiveError::TimedOut),
    }
}
