mod bitfield;
mod connection;
mod message;
mod protocol;

pub use bitfield::Bitfield;
pub use connection::{
    ConnectionPhase, PeerConnection, BITFIELD_TIMEOUT, HANDSHAKE_TIMEOUT, MAX_FRAME_LEN,
};
pub use message::{BlockInfo, PeerMessage};
pub use protocol::{Handshake, HANDSHAKE_LEN, PROTOCOL_STRING};

/// Choke and interest flags in both directions. A new connection is
/// choked and uninterested both ways.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerState {
    pub am_choking: bool,
    pub am_interested: bool,
    pub peer_choking: bool,
    pub peer_interested: bool,
}

impl Default for PeerState {
    fn default() -> Self {
        Self {
            am_choking: true,
            am_interested: false,
            peer_choking: true,
            peer_interested: false,
        }
    }
}
