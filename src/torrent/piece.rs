use crate::error::{BittorrentError, Result};

/// Length of a SHA-1 piece digest
pub const PIECE_HASH_LEN: usize = 20;

/// A 20-byte SHA1 hash representing a piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PieceHash([u8; PIECE_HASH_LEN]);

impl PieceHash {
    pub fn new(hash: [u8; PIECE_HASH_LEN]) -> Self {
        Self(hash)
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let hash: [u8; PIECE_HASH_LEN] = slice.try_into().map_err(|_| {
            BittorrentError::InvalidTorrentFile("Piece hash must be 20 bytes".to_string())
        })?;
        Ok(Self(hash))
    }

    pub fn as_bytes(&self) -> &[u8; PIECE_HASH_LEN] {
        &self.0
    }
}

impl AsRef<[u8]> for PieceHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Ordered piece hashes; position is the piece index
#[derive(Debug, Clone, Default)]
pub struct Pieces {
    hashes: Vec<PieceHash>,
}

impl Pieces {
    /// Parse pieces from concatenated SHA1 hashes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() % PIECE_HASH_LEN != 0 {
            return Err(BittorrentError::InvalidTorrentFile(format!(
                "'pieces' length {} is not a multiple of {}",
                data.len(),
                PIECE_HASH_LEN
            )));
        }

        let hashes = data
            .chunks_exact(PIECE_HASH_LEN)
            .map(PieceHash::from_slice)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { hashes })
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PieceHash> {
        self.hashes.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PieceHash> {
        self.hashes.iter()
    }
}

impl FromIterator<PieceHash> for Pieces {
    fn from_iter<I: IntoIterator<Item = PieceHash>>(iter: I) -> Self {
        Self {
            hashes: iter.into_iter().collect(),
        }
    }
}
