use crate::error::{BittorrentError, Result};
use bytes::{Buf, BufMut, BytesMut};

/// Address of one block: piece, byte offset inside it, length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub piece_index: u32,
    pub offset: u32,
    pub length: u32,
}

impl BlockInfo {
    pub fn new(piece_index: u32, offset: u32, length: u32) -> Self {
        Self {
            piece_index,
            offset,
            length,
        }
    }
}

/// Peer wire messages. Ids run from 0 (`Choke`) to 8 (`Cancel`);
/// keep-alives carry no id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerMessage {
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have { piece_index: u32 },
    Bitfield { bitfield: Vec<u8> },
    Request { block: BlockInfo },
    Piece {
        piece_index: u32,
        offset: u32,
        data: Vec<u8>,
    },
    Cancel { block: BlockInfo },
    /// Any other id; the payload is discarded
    Unknown { id: u8 },
}

impl PeerMessage {
    const CHOKE: u8 = 0;
    const UNCHOKE: u8 = 1;
    const INTERESTED: u8 = 2;
    const NOT_INTERESTED: u8 = 3;
    const HAVE: u8 = 4;
    const BITFIELD: u8 = 5;
    const REQUEST: u8 = 6;
    const PIECE: u8 = 7;
    const CANCEL: u8 = 8;

    /// Short name for logs, without payload
    pub fn name(&self) -> &'static str {
        match self {
            PeerMessage::KeepAlive => "keep-alive",
            PeerMessage::Choke => "choke",
            PeerMessage::Unchoke => "unchoke",
            PeerMessage::Interested => "interested",
            PeerMessage::NotInterested => "not-interested",
            PeerMessage::Have { .. } => "have",
            PeerMessage::Bitfield { .. } => "bitfield",
            PeerMessage::Request { .. } => "request",
            PeerMessage::Piece { .. } => "piece",
            PeerMessage::Cancel { .. } => "cancel",
            PeerMessage::Unknown { .. } => "unknown",
        }
    }

    /// Full frame: 4-byte big-endian length, then id and payload
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = BytesMut::new();
        self.write_body(&mut body);

        let mut frame = BytesMut::with_capacity(4 + body.len());
        frame.put_u32(body.len() as u32);
        frame.extend_from_slice(&body);
        frame.to_vec()
    }

    fn write_body(&self, body: &mut BytesMut) {
        match self {
            PeerMessage::KeepAlive => {}
            PeerMessage::Choke => body.put_u8(Self::CHOKE),
            PeerMessage::Unchoke => body.put_u8(Self::UNCHOKE),
            PeerMessage::Interested => body.put_u8(Self::INTERESTED),
            PeerMessage::NotInterested => body.put_u8(Self::NOT_INTERESTED),
            PeerMessage::Have { piece_index } => {
                body.put_u8(Self::HAVE);
                body.put_u32(*piece_index);
            }
            PeerMessage::Bitfield { bitfield } => {
                body.put_u8(Self::BITFIELD);
                body.put_slice(bitfield);
            }
            PeerMessage::Request { block } => write_block(body, Self::REQUEST, block),
            PeerMessage::Cancel { block } => write_block(body, Self::CANCEL, block),
            PeerMessage::Piece {
                piece_index,
                offset,
                data,
            } => {
                body.put_u8(Self::PIECE);
                body.put_u32(*piece_index);
                body.put_u32(*offset);
                body.put_slice(data);
            }
            PeerMessage::Unknown { id } => body.put_u8(*id),
        }
    }

    /// Decode one frame body, i.e. everything after the length prefix.
    /// An empty body is a keep-alive.
    pub fn decode(mut frame: &[u8]) -> Result<Self> {
        if frame.is_empty() {
            return Ok(PeerMessage::KeepAlive);
        }

        let message_id = frame.get_u8();

        match message_id {
            Self::CHOKE => Ok(PeerMessage::Choke),
            Self::UNCHOKE => Ok(PeerMessage::Unchoke),
            Self::INTERESTED => Ok(PeerMessage::Interested),
            Self::NOT_INTERESTED => Ok(PeerMessage::NotInterested),
            Self::HAVE => {
                if frame.len() != 4 {
                    return Err(BittorrentError::ProtocolViolation(format!(
                        "Have payload is {} bytes, expected 4",
                        frame.len()
                    )));
                }
                let piece_index = frame.get_u32();
                Ok(PeerMessage::Have { piece_index })
            }
            Self::BITFIELD => Ok(PeerMessage::Bitfield {
                bitfield: frame.to_vec(),
            }),
            Self::REQUEST | Self::CANCEL => {
                if frame.len() != 12 {
                    return Err(BittorrentError::ProtocolViolation(format!(
                        "message {} payload is {} bytes, expected 12",
                        message_id,
                        frame.len()
                    )));
                }
                let block = BlockInfo::new(frame.get_u32(), frame.get_u32(), frame.get_u32());
                if message_id == Self::REQUEST {
                    Ok(PeerMessage::Request { block })
                } else {
                    Ok(PeerMessage::Cancel { block })
                }
            }
            Self::PIECE => {
                if frame.len() < 8 {
                    return Err(BittorrentError::ProtocolViolation(format!(
                        "Piece payload is {} bytes, expected at least 8",
                        frame.len()
                    )));
                }
                let piece_index = frame.get_u32();
                let offset = frame.get_u32();
                Ok(PeerMessage::Piece {
                    piece_index,
                    offset,
                    data: frame.to_vec(),
                })
            }
            id => Ok(PeerMessage::Unknown { id }),
        }
    }
}

fn write_block(body: &mut BytesMut, id: u8, block: &BlockInfo) {
    body.put_u8(id);
    body.put_u32(block.piece_index);
    body.put_u32(block.offset);
    body.put_u32(block.length);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(message: &PeerMessage) -> Vec<u8> {
        message.to_bytes()[4..].to_vec()
    }

    #[test]
    fn test_fixed_encodings() {
        assert_eq!(PeerMessage::KeepAlive.to_bytes(), vec![0, 0, 0, 0]);
        assert_eq!(PeerMessage::Interested.to_bytes(), vec![0, 0, 0, 1, 2]);
        assert_eq!(
            PeerMessage::Have { piece_index: 258 }.to_bytes(),
            vec![0, 0, 0, 5, 4, 0, 0, 1, 2]
        );
        assert_eq!(
            PeerMessage::Request {
                block: BlockInfo::new(1, 16384, 16384)
            }
            .to_bytes(),
            vec![0, 0, 0, 13, 6, 0, 0, 0, 1, 0, 0, 0x40, 0, 0, 0, 0x40, 0]
        );
    }

    #[test]
    fn test_decode_messages() {
        let messages = vec![
            PeerMessage::Choke,
            PeerMessage::Unchoke,
            PeerMessage::NotInterested,
            PeerMessage::Have { piece_index: 7 },
            PeerMessage::Bitfield {
                bitfield: vec![0xff, 0x80],
            },
            PeerMessage::Cancel {
                block: BlockInfo::new(2, 0, 100),
            },
            PeerMessage::Piece {
                piece_index: 3,
                offset: 16384,
                data: b"block".to_vec(),
            },
        ];
        for message in messages {
            assert_eq!(PeerMessage::decode(&body(&message)).unwrap(), message);
        }
        assert_eq!(PeerMessage::decode(&[]).unwrap(), PeerMessage::KeepAlive);
    }

    #[test]
    fn test_unknown_id_is_not_an_error() {
        assert_eq!(
            PeerMessage::decode(&[20, 1, 2, 3]).unwrap(),
            PeerMessage::Unknown { id: 20 }
        );
    }

    #[test]
    fn test_malformed_payloads() {
        for frame in [
            vec![4, 0, 0, 1],
            vec![4, 0, 0, 0, 1, 9],
            vec![6, 0, 0, 0, 1],
            vec![7, 0, 0, 0, 1, 0, 0],
        ] {
            assert!(matches!(
                PeerMessage::decode(&frame),
                Err(BittorrentError::ProtocolViolation(_))
            ));
        }
    }
}
