use crate::core::{Block, BlockAnnouncer};
use crate::error::{NodeError, Result};
use crate::network::peer::{Direction, Peer, PeerId};
use crate::network::peer_set::PeerSet;
use log::{debug, error, info, warn};
use std::io::{ErrorKind, Read};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Largest chunk handed to a `MessageHandler` in one call. Payloads are raw bytes
/// with no framing, so one send may arrive split across several chunks.
pub const READ_CHUNK: usize = 1024;

/// Called from a peer's receive thread for every chunk read from it.
pub trait MessageHandler: Send + Sync {
    fn on_message(&self, peer: &Peer, payload: &[u8]);

    fn on_disconnect(&self, _peer: &Peer) {}
}

/// Logs each payload as (lossy) UTF-8 and does nothing else.
pub struct LogHandler;

impl MessageHandler for LogHandler {
    fn on_message(&self, peer: &Peer, payload: &[u8]) {
        info!(
            "Received {} bytes from peer {} ({}): {}",
            payload.len(),
            peer.get_id(),
            peer.get_addr(),
            String::from_utf8_lossy(payload)
        );
    }

    fn on_disconnect(&self, peer: &Peer) {
        info!("Peer {} ({}) disconnected", peer.get_id(), peer.get_addr());
    }
}

impl<F> MessageHandler for F
where
    F: Fn(&Peer, &[u8]) + Send + Sync,
{
    fn on_message(&self, peer: &Peer, payload: &[u8]) {
        self(peer, payload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSettings {
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// Listening endpoint plus the set of live peer connections.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    peers: Arc<PeerSet>,
    handler: Arc<dyn MessageHandler>,
    settings: ServerSettings,
    shutting_down: AtomicBool,
}

impl Server {
    pub fn bind(
        addr: &str,
        handler: Arc<dyn MessageHandler>,
        settings: ServerSettings,
    ) -> Result<Server> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| NodeError::Connection(format!("Failed to bind to {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| NodeError::Connection(format!("Failed to read local address: {e}")))?;
        info!("Server listening on {local_addr}");

        Ok(Server {
            listener,
            local_addr,
            peers: Arc::new(PeerSet::new()),
            handler,
            settings,
            shutting_down: AtomicBool::new(false),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peers(&self) -> &PeerSet {
        &self.peers
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Accept connections until `shutdown` is called.
    pub fn run(&self) -> Result<()> {
        for stream in self.listener.incoming() {
            if self.shutting_down.load(Ordering::SeqCst) {
                break;
            }
            match stream {
                Ok(stream) => {
                    let peer_addr = match stream.peer_addr() {
                        Ok(addr) => addr,
                        Err(e) => {
                            error!("Failed to get peer address: {e}");
                            continue;
                        }
                    };
                    if let Err(e) = self.register(stream, peer_addr, Direction::Inbound) {
                        warn!("Failed to register connection from {peer_addr}: {e}");
                    }
                }
                Err(e) => {
                    error!("Error accepting connection: {e}");
                }
            }
        }
        info!("Server on {} stopped accepting", self.local_addr);
        Ok(())
    }

    /// `run` on its own thread.
    pub fn start(self: &Arc<Self>) -> Result<JoinHandle<()>> {
        let server = Arc::clone(self);
        thread::Builder::new()
            .name(format!("accept-{}", self.local_addr.port()))
            .spawn(move || {
                if let Err(e) = server.run() {
                    error!("Accept loop failed: {e}");
                }
            })
            .map_err(|e| NodeError::Connection(format!("Failed to spawn accept thread: {e}")))
    }

    /// Open an outbound connection and start receiving from it. Nothing is
    /// registered when the connection fails.
    pub fn connect(&self, address: &str) -> Result<Arc<Peer>> {
        let addr = address
            .to_socket_addrs()
            .map_err(|e| NodeError::Connection(format!("Invalid address {address}: {e}")))?
            .next()
            .ok_or_else(|| NodeError::Connection(format!("No address found for {address}")))?;

        if self.is_own_address(addr) {
            return Err(NodeError::Connection(format!(
                "Refusing to connect to own listening address {addr}"
            )));
        }

        let stream = TcpStream::connect_timeout(&addr, self.settings.connect_timeout)
            .map_err(|e| {
                warn!("Failed to connect to {addr}: {e}");
                NodeError::Connection(format!("Failed to connect to {addr}: {e}"))
            })?;
        let peer = self.register(stream, addr, Direction::Outbound)?;
        info!("Connected to peer {} at {addr}", peer.get_id());
        Ok(peer)
    }

    pub fn broadcast(&self, payload: &[u8], exclude: Option<PeerId>) -> usize {
        self.peers.broadcast(payload, exclude)
    }

    /// Stop accepting and close every peer. Receive threads end on their own once
    /// their sockets are closed.
    pub fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        // Wake the accept loop so it sees the flag.
        let _ = TcpStream::connect_timeout(&self.wake_addr(), self.settings.connect_timeout);

        let peers = self.peers.drain();
        info!("Shutting down server, closing {} peers", peers.len());
        for peer in peers {
            peer.close();
        }
    }

    fn register(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
        direction: Direction,
    ) -> Result<Arc<Peer>> {
        stream
            .set_write_timeout(Some(self.settings.write_timeout))
            .map_err(|e| NodeError::Connection(format!("Failed to set write timeout: {e}")))?;
        let reader = stream
            .try_clone()
            .map_err(|e| NodeError::Connection(format!("Failed to clone stream: {e}")))?;

        let peer = Arc::new(Peer::new(
            self.peers.next_id(),
            addr,
            direction,
            Box::new(stream),
        ));
        self.peers.add(Arc::clone(&peer));
        // `shutdown` may have drained the set between the accept and the add above.
        if self.shutting_down.load(Ordering::SeqCst) {
            self.peers.remove(peer.get_id());
            peer.close();
            return Err(NodeError::Connection(format!(
                "Server is shutting down, dropping {direction} connection at {addr}"
            )));
        }
        debug!("Accepted {direction} peer {} at {addr}", peer.get_id());

        let guard = PeerGuard {
            peers: Arc::clone(&self.peers),
            handler: Arc::clone(&self.handler),
            peer: Arc::clone(&peer),
        };
        let spawned = thread::Builder::new()
            .name(format!("peer-{}", peer.get_id()))
            .spawn(move || receive_loop(reader, guard));
        if let Err(e) = spawned {
            // The guard was dropped with the closure, so the peer is already gone.
            return Err(NodeError::Connection(format!(
                "Failed to spawn receive thread: {e}"
            )));
        }
        Ok(peer)
    }

    fn is_own_address(&self, addr: SocketAddr) -> bool {
        if addr.port() != self.local_addr.port() {
            return false;
        }
        let own = self.local_addr.ip();
        addr.ip() == own || (own.is_unspecified() && addr.ip().is_loopback())
    }

    fn wake_addr(&self) -> SocketAddr {
        match self.local_addr.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => {
                SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.local_addr.port())
            }
            IpAddr::V6(ip) if ip.is_unspecified() => {
                SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), self.local_addr.port())
            }
            _ => self.local_addr,
        }
    }
}

impl BlockAnnouncer for Server {
    fn announce(&self, block: &Block) {
        match block.to_json() {
            Ok(payload) => {
                let delivered = self.broadcast(&payload, None);
                info!(
                    "Announced block {} to {delivered} peers",
                    block.get_index()
                );
            }
            Err(e) => error!("Failed to encode block {}: {e}", block.get_index()),
        }
    }
}

/// Unregisters and closes its peer when the receive thread ends, however it ends.
struct PeerGuard {
    peers: Arc<PeerSet>,
    handler: Arc<dyn MessageHandler>,
    peer: Arc<Peer>,
}

impl Drop for PeerGuard {
    fn drop(&mut self) {
        self.peers.remove(self.peer.get_id());
        self.peer.close();
        self.handler.on_disconnect(&self.peer);
    }
}

fn receive_loop(mut reader: TcpStream, guard: PeerGuard) {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => guard.handler.on_message(&guard.peer, &buf[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("Read from peer {} failed: {e}", guard.peer.get_id());
                break;
            }
        }
    }
}
