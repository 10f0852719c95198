use crate::session::{Client, ControlWriter, Session};
use log::debug;
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct RegistryInner {
    last_id: u64,
    clients: BTreeMap<u64, Arc<Client>>,
}

/// Live control connections, keyed by ascending connection id.
///
/// The acceptor inserts and removes entries; the help side-channel scans it to
/// find a session by peer IP. The lock is never held across I/O.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    inner: Mutex<RegistryInner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next id and records the client under it.
    pub async fn register(
        &self,
        peer_addr: SocketAddr,
        local_addr: SocketAddr,
        writer: ControlWriter,
        session: Arc<Session>,
    ) -> Arc<Client> {
        let mut inner = self.inner.lock().await;
        inner.last_id += 1;
        let client = Arc::new(Client {
            id: inner.last_id,
            peer_addr,
            local_addr,
            writer,
            session,
        });
        inner.clients.insert(client.id, Arc::clone(&client));
        debug!("Registered connection {} from {}", client.id, peer_addr);
        client
    }

    pub async fn unregister(&self, id: u64) -> Option<Arc<Client>> {
        let removed = self.inner.lock().await.clients.remove(&id);
        if removed.is_some() {
            debug!("Connection {} removed from active list", id);
        }
        removed
    }

    /// First client (lowest id) whose control connection comes from `ip`.
    pub async fn find_by_ip(&self, ip: IpAddr) -> Option<Arc<Client>> {
        let inner = self.inner.lock().await;
        inner
            .clients
            .values()
            .find(|client| client.peer_addr.ip() == ip)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.clients.len()
    }
}
