use serde::Serialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Size of one entry in a compact peer list (4-byte IPv4 + 2-byte port)
pub const COMPACT_PEER_LEN: usize = 6;

/// A candidate peer address returned by a tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PeerEndpoint {
    pub addr: SocketAddr,
}

impl PeerEndpoint {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::new(ip, port),
        }
    }

    /// Parse a peer from compact format (6 bytes: 4 IP + 2 port)
    pub fn from_compact(data: &[u8]) -> Option<Self> {
        let chunk: &[u8; COMPACT_PEER_LEN] = data.try_into().ok()?;

        let ip = Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]);
        let port = u16::from_be_bytes([chunk[4], chunk[5]]);

        Some(Self::new(IpAddr::V4(ip), port))
    }

    /// Parse a compact peer list. Stray bytes past the last whole
    /// record are ignored.
    pub fn from_compact_list(data: &[u8]) -> Vec<Self> {
        data.chunks_exact(COMPACT_PEER_LEN)
            .filter_map(Self::from_compact)
            .collect()
    }

    pub fn to_compact(&self) -> Option<[u8; COMPACT_PEER_LEN]> {
        match self.addr {
            SocketAddr::V4(v4) => {
                let mut out = [0u8; COMPACT_PEER_LEN];
                out[..4].copy_from_slice(&v4.ip().octets());
                out[4..].copy_from_slice(&v4.port().to_be_bytes());
                Some(out)
            }
            SocketAddr::V6(_) => None,
        }
    }
}

impl From<SocketAddr> for PeerEndpoint {
    fn from(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

impl fmt::Display for PeerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.addr.fmt(f)
    }
}
