use super::{Bitfield, Handshake, PeerMessage, PeerState, HANDSHAKE_LEN};
use crate::error::{BittorrentError, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info};

/// Largest frame body accepted from a peer
pub const MAX_FRAME_LEN: usize = 2 * 1024 * 1024;

pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);
pub const BITFIELD_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of an established peer connection. TCP connect and the
/// handshake run inside [`PeerConnection::connect`] and
/// [`PeerConnection::handshake`], before a connection value exists, so
/// every connection starts out awaiting the bitfield. Any failed read or
/// write moves it to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    AwaitingBitfield,
    Ready,
    Closed,
}

/// Manages a connection to a peer
pub struct PeerConnection<S = TcpStream> {
    addr: SocketAddr,
    stream: S,
    phase: ConnectionPhase,
    state: PeerState,
    peer_id: [u8; 20],
    available: Bitfield,
    deadline: Option<Instant>,
}

impl PeerConnection<TcpStream> {
    /// Connect to a peer, exchange handshakes and wait for its bitfield.
    /// TCP connect plus handshake must finish within `handshake_timeout`.
    pub async fn connect(
        addr: SocketAddr,
        info_hash: [u8; 20],
        our_peer_id: [u8; 20],
        handshake_timeout: Duration,
        bitfield_timeout: Duration,
    ) -> Result<Self> {
        info!("Connecting to peer: {}", addr);

        let mut conn = timeout(handshake_timeout, Self::open(addr, info_hash, our_peer_id))
            .await
            .map_err(|_| BittorrentError::HandshakeTimeout(addr))??;

        conn.set_deadline(Some(Instant::now() + bitfield_timeout));
        conn.receive_bitfield().await?;
        conn.set_deadline(None);

        info!(
            "Successfully connected to peer: {} ({} pieces advertised)",
            addr,
            conn.available.count()
        );

        Ok(conn)
    }

    async fn open(addr: SocketAddr, info_hash: [u8; 20], our_peer_id: [u8; 20]) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        debug!("TCP connection established with {}", addr);
        Self::handshake(stream, addr, info_hash, our_peer_id).await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> PeerConnection<S> {
    /// Exchange handshakes over an already open stream. The stream is
    /// dropped if the peer answers for a different torrent.
    pub async fn handshake(
        mut stream: S,
        addr: SocketAddr,
        info_hash: [u8; 20],
        our_peer_id: [u8; 20],
    ) -> Result<Self> {
        let handshake = Handshake::new(info_hash, our_peer_id);
        stream.write_all(&handshake.to_bytes()).await?;

        debug!("Sent handshake to {}", addr);

        let mut handshake_buf = [0u8; HANDSHAKE_LEN];
        stream.read_exact(&mut handshake_buf).await?;

        let peer_handshake = Handshake::from_bytes(&handshake_buf)?;

        if peer_handshake.info_hash != info_hash {
            return Err(BittorrentError::InfoHashMismatch {
                expected: hex::encode(info_hash),
                received: hex::encode(peer_handshake.info_hash),
            });
        }

        Ok(Self {
            addr,
            stream,
            phase: ConnectionPhase::AwaitingBitfield,
            state: PeerState::default(),
            peer_id: peer_handshake.peer_id,
            available: Bitfield::default(),
            deadline: None,
        })
    }

    /// The first message after the handshake, keep-alives aside, must be
    /// a bitfield.
    pub async fn receive_bitfield(&mut self) -> Result<()> {
        let result = self.apply_bitfield().await;
        self.closed_on_error(result)
    }

    async fn apply_bitfield(&mut self) -> Result<()> {
        match self.read_message().await? {
            PeerMessage::Bitfield { bitfield } => {
                self.available = Bitfield::from_bytes(bitfield);
                self.phase = ConnectionPhase::Ready;
                Ok(())
            }
            other => Err(BittorrentError::ProtocolViolation(format!(
                "expected bitfield from {}, got {}",
                self.addr,
                other.name()
            ))),
        }
    }

    /// Send a message to the peer
    pub async fn send_message(&mut self, message: &PeerMessage) -> Result<()> {
        let bytes = message.to_bytes();
        let written = with_deadline(self.deadline, self.stream.write_all(&bytes)).await;
        self.closed_on_error(written)?;

        match message {
            PeerMessage::Choke => self.state.am_choking = true,
            PeerMessage::Unchoke => self.state.am_choking = false,
            PeerMessage::Interested => self.state.am_interested = true,
            PeerMessage::NotInterested => self.state.am_interested = false,
            _ => {}
        }

        debug!("Sent {} to {}", message.name(), self.addr);
        Ok(())
    }

    pub async fn send_interested(&mut self) -> Result<()> {
        self.send_message(&PeerMessage::Interested).await
    }

    /// Receive the next non-keep-alive message and apply it to the
    /// connection state
    pub async fn receive_message(&mut self) -> Result<PeerMessage> {
        let result = self.apply_next_message().await;
        self.closed_on_error(result)
    }

    async fn apply_next_message(&mut self) -> Result<PeerMessage> {
        let message = self.read_message().await?;

        match &message {
            PeerMessage::Choke => self.state.peer_choking = true,
            PeerMessage::Unchoke => self.state.peer_choking = false,
            PeerMessage::Interested => self.state.peer_interested = true,
            PeerMessage::NotInterested => self.state.peer_interested = false,
            PeerMessage::Have { piece_index } => self.available.set(*piece_index as usize),
            PeerMessage::Bitfield { .. } => {
                return Err(BittorrentError::ProtocolViolation(format!(
                    "{} sent a second bitfield",
                    self.addr
                )));
            }
            PeerMessage::Unknown { id } => {
                debug!("Ignoring message with unknown id {} from {}", id, self.addr);
            }
            _ => {}
        }

        debug!("Received {} from {}", message.name(), self.addr);

        Ok(message)
    }

    async fn read_message(&mut self) -> Result<PeerMessage> {
        loop {
            let mut length_buf = [0u8; 4];
            with_deadline(self.deadline, self.stream.read_exact(&mut length_buf)).await?;

            let length = u32::from_be_bytes(length_buf) as usize;

            if length == 0 {
                continue;
            }

            if length > MAX_FRAME_LEN {
                return Err(BittorrentError::ProtocolViolation(format!(
                    "frame of {} bytes from {} exceeds limit",
                    length, self.addr
                )));
            }

            let mut frame = vec![0u8; length];
            with_deadline(self.deadline, self.stream.read_exact(&mut frame)).await?;

            return PeerMessage::decode(&frame);
        }
    }

    fn closed_on_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.phase = ConnectionPhase::Closed;
        }
        result
    }

    /// Deadline applied to every subsequent read and write; `None` clears it
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    pub async fn close(&mut self) {
        self.phase = ConnectionPhase::Closed;
        let _ = self.stream.shutdown().await;
    }

    /// Check if peer has a specific piece
    pub fn has_piece(&self, piece_index: usize) -> bool {
        self.available.test(piece_index)
    }

    pub fn is_choked(&self) -> bool {
        self.state.peer_choking
    }

    pub fn state(&self) -> &PeerState {
        &self.state
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn peer_id(&self) -> &[u8; 20] {
        &self.peer_id
    }
}

async fn with_deadline<T, F>(deadline: Option<Instant>, io: F) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    match deadline {
        Some(deadline) => match timeout_at(deadline, io).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(BittorrentError::Timeout(
                "peer did not respond before the deadline".to_string(),
            )),
        },
        None => Ok(io.await?),
    }
}
