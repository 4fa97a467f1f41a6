mod client;
mod peer;
mod request;
mod response;
mod udp;

pub use client::{TrackerClient, HTTP_TIMEOUT};
pub use peer::{PeerEndpoint, COMPACT_PEER_LEN};
pub use request::{TrackerEvent, TrackerRequest};
pub use response::TrackerResponse;
pub use udp::{UdpTracker, DEFAULT_UDP_TIMEOUT};

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::warn;
use url::Url;

pub const PEER_ID_LEN: usize = 20;
const PEER_ID_PREFIX: &[u8; 8] = b"-DT0001-";

/// Transport an announce URL is reached over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerScheme {
    Http,
    Udp,
}

impl TrackerScheme {
    pub fn classify(tracker_url: &str) -> Option<Self> {
        let url = Url::parse(tracker_url).ok()?;
        match url.scheme() {
            "http" | "https" => Some(TrackerScheme::Http),
            "udp" => Some(TrackerScheme::Udp),
            _ => None,
        }
    }
}

/// Generate a random peer ID
/// Format: -DT0001-<12 random alphanumerics>
pub fn generate_peer_id() -> [u8; PEER_ID_LEN] {
    let mut peer_id = [0u8; PEER_ID_LEN];
    peer_id[..PEER_ID_PREFIX.len()].copy_from_slice(PEER_ID_PREFIX);

    let rng = rand::thread_rng();
    for (slot, byte) in peer_id[PEER_ID_PREFIX.len()..]
        .iter_mut()
        .zip(rng.sample_iter(&Alphanumeric))
    {
        *slot = byte;
    }

    peer_id
}

/// Peer ID from the persisted configuration, or a fresh one when the
/// stored value is missing or not exactly 20 bytes.
pub fn resolve_peer_id(stored: Option<&str>) -> [u8; PEER_ID_LEN] {
    match stored {
        Some(id) => match <[u8; PEER_ID_LEN]>::try_from(id.as_bytes()) {
            Ok(peer_id) => peer_id,
            Err(_) => {
                warn!("Stored peer id has {} bytes, regenerating", id.len());
                generate_peer_id()
            }
        },
        None => generate_peer_id(),
    }
}
