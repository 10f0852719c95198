use crate::constants::{BASE_COMMANDS, SESSION_COMMANDS};
use log::{debug, trace};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, MutexGuard, Notify};
use tokio_util::sync::CancellationToken;

/// Write half of a control connection, shared by the command handlers.
pub type ControlWriter = Arc<Mutex<OwnedWriteHalf>>;

/// Handle on the accept task spawned by PASV. Dropping the handle does not
/// stop the task, cancelling the token does.
#[derive(Debug)]
pub struct DtpListener {
    pub id: u64,
    pub local_addr: SocketAddr,
    cancel: CancellationToken,
}

impl DtpListener {
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

/// Association with a help side-channel pusher. The pusher owns the socket.
#[derive(Debug)]
pub struct HelpLink {
    pub peer_addr: SocketAddr,
    cancel: CancellationToken,
}

impl HelpLink {
    pub fn new(peer_addr: SocketAddr, cancel: CancellationToken) -> Self {
        Self { peer_addr, cancel }
    }

    pub fn close(&self) {
        self.cancel.cancel();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    LoginPending,
    Authenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataChannelState {
    Idle,
    ListenerOpen,
    Connected,
}

/// Why a transfer command could not get a data connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataChannelError {
    /// No PASV listener and no connection.
    NotPassive,
    /// PASV was issued but no client connected in time.
    NoConnection,
}

impl DataChannelError {
    pub fn to_ftp_response(self) -> (u16, &'static str) {
        match self {
            DataChannelError::NotPassive => (527, "You are not in Passive Mode."),
            DataChannelError::NoConnection => (425, "No data connection. Re-enter Passive Mode."),
        }
    }
}

/// Mutable per-session fields. Only reachable through [`Session::lock`].
#[derive(Debug, Default)]
pub struct SessionState {
    pub login: String,
    pub authenticated: bool,
    pub passive: bool,
    pub dtp_listener: Option<DtpListener>,
    pub dtp_connection: Option<TcpStream>,
    pub help_link: Option<HelpLink>,
}

impl SessionState {
    pub fn auth_state(&self) -> AuthState {
        if self.authenticated {
            AuthState::Authenticated
        } else if !self.login.is_empty() {
            AuthState::LoginPending
        } else {
            AuthState::Unauthenticated
        }
    }

    pub fn data_channel_state(&self) -> DataChannelState {
        if self.dtp_connection.is_some() {
            DataChannelState::Connected
        } else if self.dtp_listener.is_some() {
            DataChannelState::ListenerOpen
        } else {
            DataChannelState::Idle
        }
    }

    /// Drops the data connection and leaves passive mode.
    pub fn close_data_connection(&mut self) {
        if self.dtp_connection.take().is_some() {
            trace!("Data connection closed");
        }
        self.passive = false;
    }

    pub fn close_listener(&mut self) {
        if let Some(listener) = self.dtp_listener.take() {
            listener.close();
            trace!("Passive listener {} on {} closed", listener.id, listener.local_addr);
        }
    }

    pub fn available_commands(&self) -> Vec<&'static str> {
        let mut commands = BASE_COMMANDS.to_vec();
        if self.authenticated {
            commands.extend_from_slice(&SESSION_COMMANDS);
        }
        commands
    }
}

/// Authentication and data-channel state of one control connection.
///
/// Always shared as `Arc<Session>`; all fields sit behind a single mutex.
#[derive(Debug)]
pub struct Session {
    state: Mutex<SessionState>,
    quit: CancellationToken,
    shutdown: CancellationToken,
    data_settled: Notify,
    help_refresh: Notify,
    next_listener_id: AtomicU64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::default()),
            quit: CancellationToken::new(),
            shutdown: CancellationToken::new(),
            data_settled: Notify::new(),
            help_refresh: Notify::new(),
            next_listener_id: AtomicU64::new(1),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }

    /// Fires once QUIT has been handled.
    pub fn quit_token(&self) -> &CancellationToken {
        &self.quit
    }

    /// Fires when the connection is torn down.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub async fn is_authenticated(&self) -> bool {
        self.lock().await.authenticated
    }

    pub async fn available_commands(&self) -> Vec<&'static str> {
        self.lock().await.available_commands()
    }

    pub async fn close_data_connection(&self) {
        self.lock().await.close_data_connection();
    }

    /// Records a freshly bound passive listener, replacing whatever listener or
    /// connection the session still had. Returns the listener id and the
    /// token the accept task must watch.
    pub async fn install_listener(&self, local_addr: SocketAddr) -> (u64, CancellationToken) {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let cancel = self.shutdown.child_token();

        let mut state = self.lock().await;
        state.close_data_connection();
        state.close_listener();
        state.dtp_listener = Some(DtpListener {
            id,
            local_addr,
            cancel: cancel.clone(),
        });
        (id, cancel)
    }

    /// Called by the accept task when it exits. A connection is only kept if
    /// listener `id` is still the installed one.
    pub async fn finish_listener(&self, id: u64, accepted: Option<TcpStream>) {
        {
            let mut state = self.lock().await;
            let current = state.dtp_listener.as_ref().map(|l| l.id) == Some(id);
            if current {
                state.dtp_listener = None;
                if let Some(stream) = accepted {
                    state.dtp_connection = Some(stream);
                    state.passive = true;
                    debug!("Passive listener {} handed over its data connection", id);
                }
            } else if accepted.is_some() {
                debug!("Passive listener {} was replaced, dropping its connection", id);
            }
        }
        self.data_settled.notify_waiters();
    }

    /// Moves the data connection out of the session and leaves passive mode,
    /// so every connection serves exactly one transfer. If a PASV listener is
    /// still waiting, gives the client up to `grace` to connect.
    pub async fn take_data_connection(&self, grace: Duration) -> Result<TcpStream, DataChannelError> {
        let settled = self.data_settled.notified();
        tokio::pin!(settled);
        settled.as_mut().enable();

        {
            let mut state = self.lock().await;
            if let Some(stream) = state.dtp_connection.take() {
                state.passive = false;
                return Ok(stream);
            }
            state.passive = false;
            if state.dtp_listener.is_none() {
                return Err(DataChannelError::NotPassive);
            }
        }

        let _ = tokio::time::timeout(grace, settled).await;

        let mut state = self.lock().await;
        state.passive = false;
        if let Some(stream) = state.dtp_connection.take() {
            return Ok(stream);
        }
        // The client is told to re-enter passive mode, so a late connection
        // on the old listener must never be used.
        state.close_listener();
        Err(DataChannelError::NoConnection)
    }

    /// Replaces the help link, closing the previous pusher if there was one.
    pub async fn attach_help(&self, link: HelpLink) {
        let mut state = self.lock().await;
        if let Some(previous) = state.help_link.replace(link) {
            previous.close();
            debug!("Replaced help link from {}", previous.peer_addr);
        }
    }

    /// Clears the help link if it still belongs to `peer_addr`.
    pub async fn detach_help(&self, peer_addr: SocketAddr) {
        let mut state = self.lock().await;
        if state.help_link.as_ref().map(|l| l.peer_addr) == Some(peer_addr) {
            state.help_link = None;
        }
    }

    /// Asks the help pusher to send the command list now.
    pub async fn request_help_refresh(&self) {
        if self.lock().await.help_link.is_some() {
            self.help_refresh.notify_one();
        }
    }

    pub async fn help_refresh_requested(&self) {
        self.help_refresh.notified().await;
    }

    /// QUIT: forget the login, drop any data channel and stop the command loop.
    pub async fn sign_out(&self) {
        {
            let mut state = self.lock().await;
            state.authenticated = false;
            state.login.clear();
            state.close_data_connection();
            state.close_listener();
        }
        self.quit.cancel();
    }

    /// Disconnect cleanup. Safe to call more than once.
    pub async fn teardown(&self) {
        self.shutdown.cancel();
        let mut state = self.lock().await;
        state.close_data_connection();
        state.close_listener();
        if let Some(link) = state.help_link.take() {
            link.close();
        }
    }
}

/// A control connection and its session.
#[derive(Debug)]
pub struct Client {
    pub id: u64,
    pub peer_addr: SocketAddr,
    pub local_addr: SocketAddr,
    pub writer: ControlWriter,
    pub session: Arc<Session>,
}
