use crate::bencode::BencodeValue;
use crate::error::{BittorrentError, Result};
use super::PeerEndpoint;
use std::net::IpAddr;

/// Response from a tracker. Absent counters default to zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerResponse {
    /// Interval in seconds to wait before next request
    pub interval: u64,
    /// Minimum announce interval
    pub min_interval: u64,
    /// Number of seeders
    pub complete: u64,
    /// Number of leechers
    pub incomplete: u64,
    /// List of peers
    pub peers: Vec<PeerEndpoint>,
}

impl TrackerResponse {
    pub fn from_bencode(value: &BencodeValue) -> Result<Self> {
        let dict = value.as_dict().ok_or_else(|| {
            BittorrentError::TrackerFailure("response must be a dict".to_string())
        })?;

        // Check for failure reason
        if let Some(failure) = dict.get(b"failure reason".as_ref()) {
            let reason = failure
                .as_str()
                .unwrap_or("unknown failure")
                .to_string();
            return Err(BittorrentError::TrackerFailure(reason));
        }

        let counter = |key: &[u8]| {
            dict.get(key)
                .and_then(|v| v.as_integer())
                .and_then(|i| u64::try_from(i).ok())
                .unwrap_or(0)
        };

        let peers = match dict.get(b"peers".as_ref()) {
            Some(BencodeValue::String(compact)) => PeerEndpoint::from_compact_list(compact),
            Some(BencodeValue::List(peer_list)) => parse_peer_list(peer_list),
            Some(_) => {
                return Err(BittorrentError::TrackerFailure(
                    "invalid 'peers' format".to_string(),
                ));
            }
            None => Vec::new(),
        };

        Ok(TrackerResponse {
            interval: counter(b"interval"),
            min_interval: counter(b"min interval"),
            complete: counter(b"complete"),
            incomplete: counter(b"incomplete"),
            peers,
        })
    }
}

/// Dictionary model: `[{ip, port, peer id}, ..]`. Entries that do not
/// describe a usable address are skipped.
fn parse_peer_list(list: &[BencodeValue]) -> Vec<PeerEndpoint> {
    list.iter()
        .filter_map(|peer| {
            let ip: IpAddr = peer.dict_get_str(b"ip")?.parse().ok()?;
            let port = u16::try_from(peer.dict_get_int(b"port")?).ok()?;
            Some(PeerEndpoint::new(ip, port))
        })
        .collect()
}
