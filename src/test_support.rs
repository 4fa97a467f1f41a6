//! Loopback fakes shared by the download tests

use crate::peer::{Bitfield, Handshake, PeerMessage, HANDSHAKE_LEN};
use crate::torrent::{PieceHash, Pieces, TorrentInfo};
use sha1::{Digest, Sha1};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const SEED_ID: [u8; 20] = *b"-FK0001-seedseedseed";

pub fn sample_data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

pub fn torrent_info(name: &str, piece_length: u64, data: &[u8]) -> TorrentInfo {
    let pieces: Pieces = data
        .chunks(piece_length as usize)
        .map(|chunk| PieceHash::new(Sha1::digest(chunk).into()))
        .collect();

    TorrentInfo {
        name: name.to_string(),
        piece_length,
        pieces,
        files: vec![crate::torrent::FileInfo {
            path: vec![name.to_string()],
            length: data.len() as u64,
        }],
        file_tree: None,
        total_length: data.len() as u64,
        is_multi_file: false,
    }
}

/// A seeding peer on 127.0.0.1 that answers every request from `data`
#[derive(Clone)]
pub struct FakePeer {
    info_hash: [u8; 20],
    data: Arc<Vec<u8>>,
    piece_length: usize,
    have: Vec<usize>,
    corrupt: bool,
}

impl FakePeer {
    pub fn new(info_hash: [u8; 20], data: &[u8], piece_length: u64) -> Self {
        let piece_count = data.len().div_ceil(piece_length as usize);
        Self {
            info_hash,
            data: Arc::new(data.to_vec()),
            piece_length: piece_length as usize,
            have: (0..piece_count).collect(),
            corrupt: false,
        }
    }

    /// Advertise only these pieces
    pub fn with_pieces(mut self, have: Vec<usize>) -> Self {
        self.have = have;
        self
    }

    /// Flip a byte in every block served
    pub fn corrupted(mut self) -> Self {
        self.corrupt = true;
        self
    }

    pub async fn spawn(self) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let peer = self.clone();
                tokio::spawn(async move {
                    let _ = peer.serve(socket).await;
                });
            }
        });

        addr
    }

    async fn serve(&self, mut socket: TcpStream) -> std::io::Result<()> {
        let mut handshake = [0u8; HANDSHAKE_LEN];
        socket.read_exact(&mut handshake).await?;
        socket
            .write_all(&Handshake::new(self.info_hash, SEED_ID).to_bytes())
            .await?;

        let piece_count = self.data.len().div_ceil(self.piece_length);
        let mut bitfield = Bitfield::new(piece_count);
        for &index in &self.have {
            bitfield.set(index);
        }
        socket
            .write_all(
                &PeerMessage::Bitfield {
                    bitfield: bitfield.as_bytes().to_vec(),
                }
                .to_bytes(),
            )
            .await?;
        socket.write_all(&PeerMessage::Unchoke.to_bytes()).await?;

        loop {
            let mut length = [0u8; 4];
            socket.read_exact(&mut length).await?;
            let length = u32::from_be_bytes(length) as usize;
            if length == 0 {
                continue;
            }

            let mut frame = vec![0u8; length];
            socket.read_exact(&mut frame).await?;

            if let Ok(PeerMessage::Request { block }) = PeerMessage::decode(&frame) {
                let begin = block.piece_index as usize * self.piece_length + block.offset as usize;
                let mut data = self.data[begin..begin + block.length as usize].to_vec();
                if self.corrupt {
                    data[0] ^= 0xff;
                }
                let reply = PeerMessage::Piece {
                    piece_index: block.piece_index,
                    offset: block.offset,
                    data,
                };
                socket.write_all(&reply.to_bytes()).await?;
            }
        }
    }
}

/// A UDP tracker that answers one connect and one announce with `peers`
pub async fn spawn_udp_tracker(peers: Vec<SocketAddr>) -> SocketAddr {
    let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = [0u8; 2048];

        let (_, from) = socket.recv_from(&mut buf).await.unwrap();
        let mut reply = vec![0, 0, 0, 0];
        reply.extend_from_slice(&buf[12..16]);
        reply.extend_from_slice(&42u64.to_be_bytes());
        socket.send_to(&reply, from).await.unwrap();

        let (_, from) = socket.recv_from(&mut buf).await.unwrap();
        let mut reply = vec![0, 0, 0, 1];
        reply.extend_from_slice(&buf[12..16]);
        reply.extend_from_slice(&1800u32.to_be_bytes());
        reply.extend_from_slice(&0u32.to_be_bytes());
        reply.extend_from_slice(&(peers.len() as u32).to_be_bytes());
        for peer in &peers {
            if let Some(compact) = crate::tracker::PeerEndpoint::from(*peer).to_compact() {
                reply.extend_from_slice(&compact);
            }
        }
        socket.send_to(&reply, from).await.unwrap();
    });

    addr
}
