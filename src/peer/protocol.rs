use crate::error::{BittorrentError, Result};
use bytes::{Buf, BufMut};

pub const PROTOCOL_STRING: &[u8] = b"BitTorrent protocol";

/// 1 + 19 + 8 + 20 + 20
pub const HANDSHAKE_LEN: usize = 68;

const RESERVED_LEN: usize = 8;

/// Opening preamble exchanged by both sides of a peer connection:
/// protocol identifier, eight reserved bytes, info hash, peer id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub info_hash: [u8; 20],
    pub peer_id: [u8; 20],
}

impl Handshake {
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20]) -> Self {
        Self { info_hash, peer_id }
    }

    /// No extension bits are advertised.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HANDSHAKE_LEN);
        out.put_u8(PROTOCOL_STRING.len() as u8);
        out.put_slice(PROTOCOL_STRING);
        out.put_bytes(0, RESERVED_LEN);
        out.put_slice(&self.info_hash);
        out.put_slice(&self.peer_id);
        out
    }

    pub fn from_bytes(mut raw: &[u8]) -> Result<Self> {
        if raw.len() < HANDSHAKE_LEN {
            return Err(BittorrentError::ProtocolViolation(format!(
                "handshake is {} bytes, expected {}",
                raw.len(),
                HANDSHAKE_LEN
            )));
        }

        let name_len = raw.get_u8() as usize;
        if name_len != PROTOCOL_STRING.len() || !raw.starts_with(PROTOCOL_STRING) {
            return Err(BittorrentError::ProtocolViolation(
                "unknown protocol identifier".to_string(),
            ));
        }
        raw.advance(name_len + RESERVED_LEN);

        let mut info_hash = [0u8; 20];
        raw.copy_to_slice(&mut info_hash);
        let mut peer_id = [0u8; 20];
        raw.copy_to_slice(&mut peer_id);

        Ok(Self::new(info_hash, peer_id))
    }
}
