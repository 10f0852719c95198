use crate::core_ftpcommand::CommandContext;
use crate::helpers::pasv_tuple;
use crate::session::{AuthState, DataChannelState, Session};
use log::{debug, error, info, trace, warn};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

/// Handles the PASV command: opens a one-shot listener, announces it, and
/// hands its single accepted connection to the session in the background.
pub async fn handle_pasv_command(ctx: &CommandContext) -> Result<(), std::io::Error> {
    let session = ctx.session();

    let (auth_state, channel_state) = {
        let state = session.lock().await;
        (state.auth_state(), state.data_channel_state())
    };
    if auth_state != AuthState::Authenticated {
        return ctx.reply(503, "Not logged in.").await;
    }
    if channel_state == DataChannelState::ListenerOpen {
        return ctx.reply(527, "Already in Passive Mode.").await;
    }

    let Some(pasv_ip) = advertised_ip(ctx) else {
        warn!(
            "No IPv4 address to advertise for connection {} (local {})",
            ctx.client.id, ctx.client.local_addr
        );
        return ctx.reply(425, "Can't open data connection.").await;
    };

    let (listener, pasv_response) = match setup_pasv_listener(pasv_ip).await {
        Ok(setup) => setup,
        Err(e) => {
            error!("Error creating passive listener: {}", e);
            return ctx.reply(425, "Can't open data connection.").await;
        }
    };

    let local_addr = listener.local_addr()?;
    let (listener_id, cancel) = session.install_listener(local_addr).await;

    ctx.reply(227, &pasv_response).await?;
    debug!("PASV response sent to client: {}", pasv_response);

    tokio::spawn(run_accept_task(
        Arc::clone(session),
        listener,
        listener_id,
        cancel,
        ctx.config.server.pasv_accept_timeout(),
    ));

    Ok(())
}

/// The configured public address, or the address the client reached us on.
fn advertised_ip(ctx: &CommandContext) -> Option<Ipv4Addr> {
    if let Some(ip) = ctx.config.server.pasv_ip() {
        return Some(ip);
    }
    match ctx.client.local_addr.ip() {
        IpAddr::V4(ip) => Some(ip),
        IpAddr::V6(ip) => ip.to_ipv4_mapped(),
    }
}

/// Sets up a passive mode (PASV) listener.
/// Returns the listener and the text of the 227 reply.
pub async fn setup_pasv_listener(
    pasv_ip: Ipv4Addr,
) -> Result<(TcpListener, String), std::io::Error> {
    let listener = TcpListener::bind((pasv_ip, 0)).await?;
    let port = listener.local_addr()?.port();

    let [a, b, c, d, p1, p2] = pasv_tuple(pasv_ip, port);
    let pasv_response = format!(
        "Entering Passive Mode ({},{},{},{},{},{}).",
        a, b, c, d, p1, p2
    );
    debug!("PASV listener set up on IP: {}, Port: {}", pasv_ip, port);
    Ok((listener, pasv_response))
}

/// Accepts the incoming connection on the passive listener.
pub async fn accept_pasv_connection(listener: &TcpListener) -> Result<TcpStream, std::io::Error> {
    let (data_stream, addr) = listener.accept().await?;
    debug!("Accepted data connection from: {}", addr);
    Ok(data_stream)
}

/// Waits for exactly one data connection, the accept deadline, or
/// cancellation (a newer PASV, QUIT, or disconnect). The listener is closed
/// when this returns.
async fn run_accept_task(
    session: Arc<Session>,
    listener: TcpListener,
    listener_id: u64,
    cancel: CancellationToken,
    accept_timeout: Duration,
) {
    let local_addr: Option<SocketAddr> = listener.local_addr().ok();

    let accepted = tokio::select! {
        _ = cancel.cancelled() => {
            trace!("Passive listener {} cancelled", listener_id);
            None
        }
        result = tokio::time::timeout(accept_timeout, accept_pasv_connection(&listener)) => {
            match result {
                Ok(Ok(stream)) => Some(stream),
                Ok(Err(e)) => {
                    error!("Error accepting data connection: {}", e);
                    None
                }
                Err(_) => {
                    info!("No data connection within {:?}, abandoning passive listener", accept_timeout);
                    None
                }
            }
        }
    };

    drop(listener);
    debug!("Passive listener {} on {:?} is being closed", listener_id, local_addr);
    session.finish_listener(listener_id, accepted).await;
}
