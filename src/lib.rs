//! Download-only BitTorrent client: bencode codec, metainfo parsing,
//! HTTP/UDP tracker discovery, the peer wire protocol and a concurrent
//! piece scheduler.

pub mod bencode;
pub mod client;
pub mod error;
pub mod peer;
pub mod piece;
pub mod storage;
pub mod torrent;
pub mod tracker;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{BittorrentError, Result};
