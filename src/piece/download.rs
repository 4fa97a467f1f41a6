use super::{PieceWork, BLOCK_SIZE, MAX_BACKLOG};
use crate::error::{BittorrentError, Result};
use crate::peer::BlockInfo;
use std::collections::VecDeque;
use tracing::debug;

/// Block bookkeeping for one piece being fetched from one peer
#[derive(Debug)]
pub struct PieceDownload {
    index: u32,
    length: u32,
    data: Vec<u8>,
    /// Block offsets not requested yet, in ascending order
    pending: VecDeque<u32>,
    /// Block offsets requested and not answered
    in_flight: Vec<u32>,
    received: Vec<bool>,
    downloaded: u32,
}

impl PieceDownload {
    pub fn new(work: &PieceWork) -> Self {
        let blocks = work.block_count();
        Self {
            index: work.index as u32,
            length: work.length,
            data: vec![0u8; work.length as usize],
            pending: (0..blocks as u32).map(|b| b * BLOCK_SIZE).collect(),
            in_flight: Vec::with_capacity(MAX_BACKLOG),
            received: vec![false; blocks],
            downloaded: 0,
        }
    }

    /// Next block to request, if the backlog has room
    pub fn next_request(&mut self) -> Option<BlockInfo> {
        if self.in_flight.len() >= MAX_BACKLOG {
            return None;
        }
        let offset = self.pending.pop_front()?;
        self.in_flight.push(offset);
        Some(BlockInfo::new(self.index, offset, self.block_len(offset)))
    }

    /// A choking peer discards our outstanding requests
    pub fn on_choke(&mut self) {
        if self.in_flight.is_empty() {
            return;
        }
        debug!(
            "Piece {}: {} requests dropped by choke",
            self.index,
            self.in_flight.len()
        );
        self.pending.extend(self.in_flight.drain(..));
        self.pending.make_contiguous().sort_unstable();
    }

    /// Store a received block. Blocks already stored are ignored.
    pub fn add_block(&mut self, piece_index: u32, offset: u32, block: &[u8]) -> Result<()> {
        if piece_index != self.index {
            return Err(BittorrentError::ProtocolViolation(format!(
                "block for piece {} while downloading piece {}",
                piece_index, self.index
            )));
        }

        if offset % BLOCK_SIZE != 0 || offset >= self.length {
            return Err(BittorrentError::ProtocolViolation(format!(
                "block offset {} invalid for piece {} of {} bytes",
                offset, self.index, self.length
            )));
        }

        let expected = self.block_len(offset);
        if block.len() != expected as usize {
            return Err(BittorrentError::ProtocolViolation(format!(
                "block at offset {} has {} bytes, expected {}",
                offset,
                block.len(),
                expected
            )));
        }

        let slot = (offset / BLOCK_SIZE) as usize;
        if self.received[slot] {
            debug!("Piece {}: duplicate block at offset {}", self.index, offset);
            return Ok(());
        }

        let start = offset as usize;
        self.data[start..start + block.len()].copy_from_slice(block);
        self.received[slot] = true;
        self.downloaded += expected;

        self.in_flight.retain(|&o| o != offset);
        self.pending.retain(|&o| o != offset);

        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.downloaded == self.length
    }

    pub fn backlog(&self) -> usize {
        self.in_flight.len()
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    fn block_len(&self, offset: u32) -> u32 {
        std::cmp::min(BLOCK_SIZE, self.length - offset)
    }
}
