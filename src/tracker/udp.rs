use super::{PeerEndpoint, TrackerRequest, TrackerResponse};
use crate::error::{BittorrentError, Result};
use bytes::{Buf, BufMut, BytesMut};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::timeout;
use tracing::debug;
use url::Url;

const PROTOCOL_ID: u64 = 0x41727101980;
const ACTION_CONNECT: u32 = 0;
const ACTION_ANNOUNCE: u32 = 1;
const ACTION_ERROR: u32 = 3;

pub const CONNECT_PACKET_LEN: usize = 16;
pub const ANNOUNCE_PACKET_LEN: usize = 98;
/// action + transaction id + interval + leechers + seeders
pub const ANNOUNCE_HEADER_LEN: usize = 20;

/// Largest UDP payload over IPv4; an unlimited `num_want` can fill it
const MAX_DATAGRAM_LEN: usize = 65_507;

pub const DEFAULT_UDP_TIMEOUT: Duration = Duration::from_secs(15);

/// BEP-15 announce over UDP: a connect round trip followed by an
/// announce round trip, each bounded by `timeout`.
#[derive(Debug, Clone)]
pub struct UdpTracker {
    timeout: Duration,
}

impl UdpTracker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn announce(&self, tracker_url: &str, request: &TrackerRequest) -> Result<TrackerResponse> {
        let addr = resolve(tracker_url).await?;

        let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(addr).await?;

        let transaction_id: u32 = rand::random();
        let reply = self
            .round_trip(&socket, &connect_packet(transaction_id), CONNECT_PACKET_LEN)
            .await?;
        let connection_id = parse_connect_reply(&reply, transaction_id)?;

        debug!("UDP tracker {} connected (connection id {:#x})", addr, connection_id);

        let transaction_id: u32 = rand::random();
        let packet = announce_packet(connection_id, transaction_id, request);
        let reply = self.round_trip(&socket, &packet, ANNOUNCE_HEADER_LEN).await?;

        parse_announce_reply(&reply, transaction_id)
    }

    async fn round_trip(&self, socket: &UdpSocket, packet: &[u8], min_len: usize) -> Result<Vec<u8>> {
        socket.send(packet).await?;

        let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
        let n = timeout(self.timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| {
                BittorrentError::TrackerFailure(format!(
                    "no UDP reply within {:?}",
                    self.timeout
                ))
            })??;

        // Error replies carry a message instead of the usual body
        if n >= 8 && u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) == ACTION_ERROR {
            let message = String::from_utf8_lossy(&buf[8..n]).to_string();
            return Err(BittorrentError::TrackerFailure(message));
        }

        if n < min_len {
            return Err(BittorrentError::TrackerFailure(format!(
                "UDP reply of {} bytes, expected at least {}",
                n, min_len
            )));
        }

        buf.truncate(n);
        Ok(buf)
    }
}

impl Default for UdpTracker {
    fn default() -> Self {
        Self::new(DEFAULT_UDP_TIMEOUT)
    }
}

async fn resolve(tracker_url: &str) -> Result<SocketAddr> {
    let url = Url::parse(tracker_url)?;
    let host = url
        .host_str()
        .ok_or_else(|| BittorrentError::UrlParseError(format!("no host in {}", tracker_url)))?;
    let port = url
        .port()
        .ok_or_else(|| BittorrentError::UrlParseError(format!("no port in {}", tracker_url)))?;

    // Url keeps the brackets around IPv6 literals
    let host = host.trim_start_matches('[').trim_end_matches(']');

    let addr = lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| BittorrentError::TrackerFailure(format!("cannot resolve {}", host)));
    addr
}

pub fn connect_packet(transaction_id: u32) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(CONNECT_PACKET_LEN);
    buf.put_u64(PROTOCOL_ID);
    buf.put_u32(ACTION_CONNECT);
    buf.put_u32(transaction_id);
    buf.to_vec()
}

pub fn parse_connect_reply(mut reply: &[u8], transaction_id: u32) -> Result<u64> {
    if reply.len() < CONNECT_PACKET_LEN {
        return Err(BittorrentError::TrackerFailure(
            "connect reply too short".to_string(),
        ));
    }

    let action = reply.get_u32();
    let tid = reply.get_u32();
    if action != ACTION_CONNECT || tid != transaction_id {
        return Err(BittorrentError::TrackerFailure(
            "connect reply does not match request".to_string(),
        ));
    }

    Ok(reply.get_u64())
}

pub fn announce_packet(connection_id: u64, transaction_id: u32, request: &TrackerRequest) -> Vec<u8> {
    let event = request.event.map(|e| e.as_udp_id()).unwrap_or(0);

    let mut buf = BytesMut::with_capacity(ANNOUNCE_PACKET_LEN);
    buf.put_u64(connection_id);
    buf.put_u32(ACTION_ANNOUNCE);
    buf.put_u32(transaction_id);
    buf.put_slice(&request.info_hash);
    buf.put_slice(&request.peer_id);
    buf.put_u64(request.downloaded);
    buf.put_u64(request.left);
    buf.put_u64(request.uploaded);
    buf.put_u32(event);
    buf.put_u32(0); // IP address: use the sender's
    buf.put_u32(0); // key
    buf.put_u32(u32::MAX); // num_want: no limit
    buf.put_u16(request.port);
    buf.to_vec()
}

/// Parse an announce reply. Bytes past the header form the compact peer
/// list; a trailing partial record is dropped.
pub fn parse_announce_reply(mut reply: &[u8], transaction_id: u32) -> Result<TrackerResponse> {
    if reply.len() < ANNOUNCE_HEADER_LEN {
        return Err(BittorrentError::TrackerFailure(
            "announce reply too short".to_string(),
        ));
    }

    let action = reply.get_u32();
    let tid = reply.get_u32();
    if action != ACTION_ANNOUNCE || tid != transaction_id {
        return Err(BittorrentError::TrackerFailure(
            "announce reply does not match request".to_string(),
        ));
    }

    let interval = reply.get_u32();
    let leechers = reply.get_u32();
    let seeders = reply.get_u32();

    Ok(TrackerResponse {
        interval: interval as u64,
        min_interval: 0,
        complete: seeders as u64,
        incomplete: leechers as u64,
        peers: PeerEndpoint::from_compact_list(reply),
    })
}
