mod download;
mod queue;

pub use download::PieceDownload;
pub use queue::WorkQueue;

use crate::torrent::TorrentInfo;
use sha1::{Digest, Sha1};

/// Standard block size (16 KB)
pub const BLOCK_SIZE: u32 = 16 * 1024;

/// Maximum number of unanswered block requests per peer
pub const MAX_BACKLOG: usize = 5;

/// A piece still to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceWork {
    pub index: usize,
    pub hash: [u8; 20],
    pub length: u32,
}

impl PieceWork {
    /// One work item per piece, in index order
    pub fn all_from(info: &TorrentInfo) -> Vec<PieceWork> {
        info.pieces
            .iter()
            .enumerate()
            .filter_map(|(index, hash)| {
                let length = info.piece_size(index)?;
                Some(PieceWork {
                    index,
                    hash: *hash.as_bytes(),
                    length: length as u32,
                })
            })
            .collect()
    }

    /// Check downloaded data against the expected SHA1
    pub fn verify(&self, data: &[u8]) -> bool {
        let mut hasher = Sha1::new();
        hasher.update(data);
        hasher.finalize().as_slice() == self.hash
    }

    pub fn block_count(&self) -> usize {
        self.length.div_ceil(BLOCK_SIZE) as usize
    }
}

/// A verified piece
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceResult {
    pub index: usize,
    pub data: Vec<u8>,
}
