/// Piece availability as a packed bit set. Bit 0 is the high bit of the
/// first byte. Indices past the storage are never set and never reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitfield {
    bits: Vec<u8>,
}

impl Bitfield {
    /// Empty bitfield able to hold `piece_count` bits
    pub fn new(piece_count: usize) -> Self {
        Self {
            bits: vec![0; piece_count.div_ceil(8)],
        }
    }

    /// Bitfield taken verbatim from a wire payload
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bits: bytes }
    }

    pub fn test(&self, index: usize) -> bool {
        match self.bits.get(index / 8) {
            Some(byte) => byte >> (7 - index % 8) & 1 == 1,
            None => false,
        }
    }

    pub fn set(&mut self, index: usize) {
        if let Some(byte) = self.bits.get_mut(index / 8) {
            *byte |= 1 << (7 - index % 8);
        }
    }

    /// Number of bits this field can hold
    pub fn capacity(&self) -> usize {
        self.bits.len() * 8
    }

    pub fn count(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }
}
