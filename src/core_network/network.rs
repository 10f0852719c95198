use crate::constants::MAX_COMMAND_LENGTH;
use crate::core_ftpcommand::ftpcommand::parse_command_line;
use crate::core_ftpcommand::handlers::{dispatch, handle_unknown_command};
use crate::core_ftpcommand::{CommandContext, FtpCommand};
use crate::core_network::registry::ConnectionRegistry;
use crate::server::Services;
use crate::session::{Client, Session};
use anyhow::Result;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

/// Accepts control connections until the listener fails.
pub async fn start_server(listener: TcpListener, services: Services) -> Result<()> {
    info!("Server listening on {}", listener.local_addr()?);

    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Connection error {}", e);
                continue;
            }
        };
        info!("New connection from {:?}", addr);

        let services = services.clone();
        tokio::spawn(async move {
            if let Err(e) = accept_connection(socket, services).await {
                error!("Connection error: {:?}", e);
            }
        });
    }
}

/// Registers a fresh session for `socket` and runs its command loop to
/// completion, then tears it down.
pub async fn accept_connection(socket: TcpStream, services: Services) -> Result<()> {
    let peer_addr = socket.peer_addr()?;
    let local_addr = socket.local_addr()?;
    let (reader, writer) = socket.into_split();

    let client = services
        .registry
        .register(
            peer_addr,
            local_addr,
            Arc::new(Mutex::new(writer)),
            Arc::new(Session::new()),
        )
        .await;
    info!("Accepted new connection: id = {} {}", client.id, peer_addr);

    let ctx = CommandContext {
        client: Arc::clone(&client),
        config: Arc::clone(&services.config),
        accounts: Arc::clone(&services.accounts),
        files: Arc::clone(&services.files),
        index: Arc::clone(&services.index),
    };

    let outcome = handle_connection(reader, &ctx).await;
    handle_disconnect(&client, &services.registry).await;
    outcome
}

/// Reads one command per line and runs it to completion before reading the
/// next one, so commands of a session never interleave.
pub async fn handle_connection(reader: OwnedReadHalf, ctx: &CommandContext) -> Result<()> {
    let server = &ctx.config.server;
    let welcome = format!(
        "Welcome to {} server, user {}! Available commands: {}",
        server.server_name,
        ctx.client.id,
        ctx.session().available_commands().await.join(", ")
    );
    ctx.reply(220, &welcome).await?;

    let quit = ctx.session().quit_token().clone();
    let mut reader = BufReader::new(reader);
    let mut buffer = Vec::with_capacity(MAX_COMMAND_LENGTH);
    // Set while skipping the tail of an overlong line.
    let mut discarding = false;

    loop {
        buffer.clear();
        let mut limited = (&mut reader).take(MAX_COMMAND_LENGTH as u64);
        let n = tokio::select! {
            _ = quit.cancelled() => break,
            read = limited.read_until(b'\n', &mut buffer) => read?,
        };
        if n == 0 {
            debug!("Connection {} closed by client", ctx.client.id);
            break;
        }

        let complete = buffer.ends_with(b"\n");
        if discarding {
            discarding = !complete;
            continue;
        }
        if !complete && n == MAX_COMMAND_LENGTH {
            warn!(
                "Connection {} sent a line longer than {} bytes",
                ctx.client.id, MAX_COMMAND_LENGTH
            );
            ctx.reply(501, "Command line too long.").await?;
            discarding = true;
            continue;
        }

        let line = String::from_utf8_lossy(&buffer);
        let Some(command_line) = parse_command_line(&line) else {
            continue;
        };
        debug!(
            "Received command from {}: {} ({} args)",
            ctx.client.id,
            command_line.verb,
            command_line.args.len()
        );

        match FtpCommand::parse(&command_line.verb) {
            Some(command) => dispatch(command, ctx, &command_line.args).await?,
            None => handle_unknown_command(ctx, &command_line.verb).await?,
        }

        if quit.is_cancelled() {
            break;
        }
    }
    Ok(())
}

/// Closes the control connection and everything hanging off the session, and
/// drops the client from the registry. Idempotent.
pub async fn handle_disconnect(client: &Client, registry: &ConnectionRegistry) {
    {
        let mut writer = client.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!("Error closing connection {}: {}", client.id, e);
        }
    }
    client.session.teardown().await;

    if registry.unregister(client.id).await.is_none() {
        warn!("Connection {} was already unregistered", client.id);
    }
    info!(
        "Connection {} closed and removed from active list ({} still open)",
        client.id,
        registry.len().await
    );
}
