//! Peer-to-peer networking
//!
//! Plain TCP connections carrying raw bytes: one listener, one receive thread
//! per peer, and best-effort broadcast to every live peer.

pub mod peer;
pub mod peer_set;
pub mod public_ip;
pub mod server;

pub use peer::{Direction, Peer, PeerId, Transport};
pub use peer_set::PeerSet;
pub use public_ip::public_ip;
pub use server::{LogHandler, MessageHandler, Server, ServerSettings, READ_CHUNK};
