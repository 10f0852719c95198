use crate::core_network::registry::ConnectionRegistry;
use crate::session::{HelpLink, Session};
use log::{debug, error, info, trace};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

/// Accepts help side-channel connections and pairs each one with the control
/// session coming from the same IP. Unmatched connections are closed at once.
pub async fn run_help_listener(
    listener: TcpListener,
    registry: Arc<ConnectionRegistry>,
    push_interval: Duration,
) {
    loop {
        let (help_stream, peer_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("HELP connection error {}", e);
                continue;
            }
        };

        let Some(client) = registry.find_by_ip(peer_addr.ip()).await else {
            info!(
                "No matching client session found for help connection: {}",
                peer_addr
            );
            drop(help_stream);
            continue;
        };

        debug!(
            "Help connection {} attached to connection {}",
            peer_addr, client.id
        );
        attach_help_connection(
            Arc::clone(&client.session),
            help_stream,
            peer_addr,
            push_interval,
        )
        .await;
    }
}

/// Records the association on the session and spawns the pusher.
pub async fn attach_help_connection(
    session: Arc<Session>,
    help_stream: TcpStream,
    peer_addr: SocketAddr,
    push_interval: Duration,
) {
    let link_cancel = session.shutdown_token().child_token();
    session
        .attach_help(HelpLink::new(peer_addr, link_cancel.clone()))
        .await;
    tokio::spawn(handle_help_connection(
        session,
        help_stream,
        peer_addr,
        link_cancel,
        push_interval,
    ));
}

/// Pushes the session's command list now, every `push_interval`, and
/// whenever a refresh is requested. Stops when the peer goes away or the link
/// is cancelled; the socket is closed on return.
pub async fn handle_help_connection(
    session: Arc<Session>,
    mut help_stream: TcpStream,
    peer_addr: SocketAddr,
    cancel: CancellationToken,
    push_interval: Duration,
) {
    loop {
        let command_list = session.available_commands().await.join(" ") + "\n";
        if let Err(e) = help_stream.write_all(command_list.as_bytes()).await {
            debug!("Error writing commands to help connection {}: {}", peer_addr, e);
            break;
        }
        trace!("Pushed command list to {}", peer_addr);

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = session.help_refresh_requested() => {}
            _ = tokio::time::sleep(push_interval) => {}
        }
    }

    let _ = help_stream.shutdown().await;
    session.detach_help(peer_addr).await;
    debug!("Help connection {} closed", peer_addr);
}
