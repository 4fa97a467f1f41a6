use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BittorrentError {
    #[error("Malformed bencode: {0}")]
    MalformedEncoding(String),

    #[error("Unexpected end of bencode input")]
    UnexpectedEndOfInput,

    #[error("Invalid torrent file: {0}")]
    InvalidTorrentFile(String),

    #[error("Tracker failure: {0}")]
    TrackerFailure(String),

    #[error("Handshake with {0} timed out")]
    HandshakeTimeout(SocketAddr),

    #[error("Info hash mismatch: expected {expected}, peer sent {received}")]
    InfoHashMismatch { expected: String, received: String },

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Piece {index} failed hash verification")]
    IntegrityFailure { index: usize },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("No peers available")]
    NoPeers,

    #[error("Download stalled with {completed}/{total} pieces complete")]
    DownloadStalled { completed: usize, total: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(String),
}

impl BittorrentError {
    /// Failures confined to a single peer connection. The scheduler absorbs
    /// these by requeueing work and dropping the peer.
    pub fn is_peer_local(&self) -> bool {
        matches!(
            self,
            BittorrentError::HandshakeTimeout(_)
                | BittorrentError::InfoHashMismatch { .. }
                | BittorrentError::ProtocolViolation(_)
                | BittorrentError::IntegrityFailure { .. }
                | BittorrentError::Timeout(_)
                | BittorrentError::IoError(_)
        )
    }
}

impl From<url::ParseError> for BittorrentError {
    fn from(err: url::ParseError) -> Self {
        BittorrentError::UrlParseError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BittorrentError>;
