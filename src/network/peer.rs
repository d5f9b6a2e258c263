use crate::error::{NodeError, Result};
use log::{debug, error};
use std::fmt;
use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Mutex;

/// Node-local connection id, never reused within a process.
pub type PeerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => write!(f, "inbound"),
            Direction::Outbound => write!(f, "outbound"),
        }
    }
}

/// The write half of a connection.
pub trait Transport: Send {
    fn send(&mut self, payload: &[u8]) -> Result<()>;
    fn close(&mut self);
}

impl Transport for TcpStream {
    fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.write_all(payload)
            .map_err(|e| NodeError::Connection(format!("Send failed: {e}")))?;
        self.flush()
            .map_err(|e| NodeError::Connection(format!("Flush failed: {e}")))
    }

    fn close(&mut self) {
        // Already-closed sockets report NotConnected here.
        let _ = self.shutdown(Shutdown::Both);
    }
}

pub struct Peer {
    id: PeerId,
    addr: SocketAddr,
    direction: Direction,
    transport: Mutex<Box<dyn Transport>>,
}

impl Peer {
    pub fn new(
        id: PeerId,
        addr: SocketAddr,
        direction: Direction,
        transport: Box<dyn Transport>,
    ) -> Peer {
        Peer {
            id,
            addr,
            direction,
            transport: Mutex::new(transport),
        }
    }

    pub fn get_id(&self) -> PeerId {
        self.id
    }

    pub fn get_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn get_direction(&self) -> Direction {
        self.direction
    }

    pub fn send(&self, payload: &[u8]) -> Result<()> {
        let mut transport = self.transport.lock().map_err(|_| {
            error!("Failed to acquire transport lock for peer {}", self.id);
            NodeError::Connection(format!("peer {} transport lock poisoned", self.id))
        })?;
        transport.send(payload)
    }

    pub fn close(&self) {
        match self.transport.lock() {
            Ok(mut transport) => {
                debug!("Closing {} peer {} ({})", self.direction, self.id, self.addr);
                transport.close();
            }
            Err(_) => error!("Failed to acquire transport lock for peer {}", self.id),
        }
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("direction", &self.direction)
            .finish()
    }
}
