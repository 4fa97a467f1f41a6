mod file_tree;
mod metainfo;
mod piece;

pub use file_tree::{FileNode, NodeKind};
pub use metainfo::{FileInfo, Metainfo, TorrentInfo};
pub use piece::{PieceHash, Pieces, PIECE_HASH_LEN};

use crate::bencode::decode;
use crate::error::Result;
use std::path::Path;
use tokio::fs;

/// Load and parse a .torrent file
pub async fn load_torrent_file<P: AsRef<Path>>(path: P) -> Result<Metainfo> {
    let data = fs::read(path).await?;
    parse_torrent(&data)
}

/// Parse torrent data from bytes
pub fn parse_torrent(data: &[u8]) -> Result<Metainfo> {
    let value = decode(data)?;
    Metainfo::from_bencode(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bencode::{encode, BencodeValue};
    use crate::error::BittorrentError;
    use sha1::{Digest, Sha1};

    fn single_file_info(length: i64, piece_length: i64, pieces: usize) -> BencodeValue {
        BencodeValue::dict([
            ("name", BencodeValue::bytes("ubuntu.iso")),
            ("length", BencodeValue::Integer(length)),
            ("piece length", BencodeValue::Integer(piece_length)),
            ("pieces", BencodeValue::String(vec![7u8; 20 * pieces])),
        ])
    }

    fn torrent(info: BencodeValue) -> BencodeValue {
        BencodeValue::dict([
            ("announce", BencodeValue::bytes("http://tracker.example/announce")),
            ("comment", BencodeValue::bytes("hello")),
            ("created by", BencodeValue::bytes("mktorrent")),
            ("creation date", BencodeValue::Integer(1_700_000_000)),
            ("info", info),
        ])
    }

    fn assert_invalid(value: &BencodeValue) {
        match Metainfo::from_bencode(value) {
            Err(BittorrentError::InvalidTorrentFile(_)) => {}
            other => panic!("expected InvalidTorrentFile, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_single_file() {
        let data = encode(&torrent(single_file_info(600_000, 262_144, 3)));
        let meta = parse_torrent(&data).unwrap();

        assert_eq!(meta.announce, "http://tracker.example/announce");
        assert_eq!(meta.comment.as_deref(), Some("hello"));
        assert_eq!(meta.created_by.as_deref(), Some("mktorrent"));
        assert_eq!(meta.created_at, Some(1_700_000_000));
        assert_eq!(meta.info.name, "ubuntu.iso");
        assert!(!meta.info.is_multi_file);
        assert_eq!(meta.info.total_length, 600_000);
        assert_eq!(meta.info.piece_count(), 3);
        assert_eq!(meta.info.piece_size(0), Some(262_144));
        assert_eq!(meta.info.piece_size(2), Some(75_712));
        assert_eq!(meta.info.piece_size(3), None);
        assert_eq!(meta.info.files.len(), 1);
        assert!(meta.info.file_tree.is_none());
    }

    #[test]
    fn test_info_hash_is_sha1_of_info_dict() {
        let info = single_file_info(10, 16, 1);
        let meta = Metainfo::from_bencode(&torrent(info.clone())).unwrap();

        let expected: [u8; 20] = Sha1::digest(encode(&info)).into();
        assert_eq!(meta.info_hash, expected);
        assert_eq!(meta.info_hash_hex(), hex::encode(expected));
    }

    #[test]
    fn test_info_hash_independent_of_key_order() {
        let sorted = b"d8:announce3:url4:infod6:lengthi10e4:name1:a12:piece lengthi16e6:pieces20:aaaaaaaaaaaaaaaaaaaaee";
        let shuffled = b"d4:infod6:pieces20:aaaaaaaaaaaaaaaaaaaa12:piece lengthi16e4:name1:a6:lengthi10ee8:announce3:urle";

        let a = parse_torrent(sorted).unwrap();
        let b = parse_torrent(shuffled).unwrap();
        assert_eq!(a.info_hash, b.info_hash);

        let raw_info = b"d6:lengthi10e4:name1:a12:piece lengthi16e6:pieces20:aaaaaaaaaaaaaaaaaaaae";
        let expected: [u8; 20] = Sha1::digest(raw_info).into();
        assert_eq!(a.info_hash, expected);
    }

    #[test]
    fn test_unknown_info_keys_are_hashed() {
        let plain = single_file_info(10, 16, 1);
        let mut extended = plain.clone();
        if let BencodeValue::Dict(d) = &mut extended {
            d.insert(b"private".to_vec(), BencodeValue::Integer(1));
        }

        let a = Metainfo::from_bencode(&torrent(plain)).unwrap();
        let b = Metainfo::from_bencode(&torrent(extended)).unwrap();
        assert_ne!(a.info_hash, b.info_hash);
    }

    #[test]
    fn test_parse_multi_file() {
        let file = |path: &[&str], length: i64| {
            BencodeValue::dict([
                ("length", BencodeValue::Integer(length)),
                (
                    "path",
                    BencodeValue::List(path.iter().map(BencodeValue::bytes).collect()),
                ),
            ])
        };
        let info = BencodeValue::dict([
            ("name", BencodeValue::bytes("album")),
            ("piece length", BencodeValue::Integer(16)),
            ("pieces", BencodeValue::String(vec![0u8; 40])),
            (
                "files",
                BencodeValue::List(vec![
                    file(&["cd1", "01.flac"], 10),
                    file(&["cover.jpg"], 5),
                    file(&["cd1", "02.flac"], 12),
                ]),
            ),
        ]);

        let meta = Metainfo::from_bencode(&torrent(info)).unwrap();
        assert!(meta.info.is_multi_file);
        assert_eq!(meta.info.total_length, 27);
        assert_eq!(meta.info.files.len(), 3);
        assert_eq!(meta.info.files[2].path, ["cd1", "02.flac"]);

        let tree = meta.info.file_tree.as_ref().unwrap();
        assert_eq!(tree.name, "album");
        assert_eq!(tree.length, 27);
        let cd1 = tree.child("cd1").unwrap();
        assert_eq!(cd1.children.len(), 2);
        assert_eq!(cd1.children[0].name, "01.flac");
        assert_eq!(tree.children[1].name, "cover.jpg");
    }

    #[test]
    fn test_missing_name_gets_placeholder() {
        let info = BencodeValue::dict([
            ("length", BencodeValue::Integer(10)),
            ("piece length", BencodeValue::Integer(16)),
            ("pieces", BencodeValue::String(vec![0u8; 20])),
        ]);
        let a = Metainfo::from_bencode(&torrent(info.clone())).unwrap();
        let b = Metainfo::from_bencode(&torrent(info)).unwrap();
        assert!(!a.info.name.is_empty());
        assert_ne!(a.info.name, b.info.name);
    }

    #[test]
    fn test_required_fields() {
        let no_announce = BencodeValue::dict([("info", single_file_info(10, 16, 1))]);
        assert_invalid(&no_announce);

        let no_info = BencodeValue::dict([("announce", BencodeValue::bytes("http://t"))]);
        assert_invalid(&no_info);

        assert_invalid(&BencodeValue::List(vec![]));
    }

    #[test]
    fn test_info_schema_violations() {
        // zero piece length
        assert_invalid(&torrent(single_file_info(10, 0, 1)));
        // piece count does not cover the content
        assert_invalid(&torrent(single_file_info(100, 16, 1)));

        let bad_pieces = BencodeValue::dict([
            ("length", BencodeValue::Integer(10)),
            ("piece length", BencodeValue::Integer(16)),
            ("pieces", BencodeValue::String(vec![0u8; 19])),
        ]);
        assert_invalid(&torrent(bad_pieces));

        let neither = BencodeValue::dict([
            ("piece length", BencodeValue::Integer(16)),
            ("pieces", BencodeValue::String(Vec::new())),
        ]);
        assert_invalid(&torrent(neither));

        let both = BencodeValue::dict([
            ("length", BencodeValue::Integer(0)),
            ("files", BencodeValue::List(vec![])),
            ("piece length", BencodeValue::Integer(16)),
            ("pieces", BencodeValue::String(Vec::new())),
        ]);
        assert_invalid(&torrent(both));
    }

    #[test]
    fn test_path_traversal_rejected() {
        let info = BencodeValue::dict([
            ("name", BencodeValue::bytes("x")),
            ("piece length", BencodeValue::Integer(16)),
            ("pieces", BencodeValue::String(vec![0u8; 20])),
            (
                "files",
                BencodeValue::List(vec![BencodeValue::dict([
                    ("length", BencodeValue::Integer(4)),
                    (
                        "path",
                        BencodeValue::List(vec![
                            BencodeValue::bytes(".."),
                            BencodeValue::bytes("etc"),
                        ]),
                    ),
                ])]),
            ),
        ]);
        assert_invalid(&torrent(info));
    }

    #[test]
    fn test_file_lengths_overflowing_total_rejected() {
        let huge_file = |name: &str| {
            BencodeValue::dict([
                ("length", BencodeValue::Integer(i64::MAX)),
                ("path", BencodeValue::List(vec![BencodeValue::bytes(name)])),
            ])
        };
        let info = BencodeValue::dict([
            ("name", BencodeValue::bytes("x")),
            ("piece length", BencodeValue::Integer(16)),
            ("pieces", BencodeValue::String(vec![0u8; 20])),
            (
                "files",
                BencodeValue::List(vec![huge_file("a"), huge_file("b"), huge_file("c")]),
            ),
        ]);
        let data = encode(&torrent(info));
        assert!(matches!(
            parse_torrent(&data),
            Err(BittorrentError::InvalidTorrentFile(_))
        ));
    }

    #[test]
    fn test_announce_list_flattening() {
        let mut value = torrent(single_file_info(10, 16, 1));
        if let BencodeValue::Dict(d) = &mut value {
            d.insert(
                b"announce-list".to_vec(),
                BencodeValue::List(vec![
                    BencodeValue::List(vec![
                        BencodeValue::bytes("http://tracker.example/announce"),
                        BencodeValue::bytes("udp://backup.example:6969"),
                    ]),
                    BencodeValue::bytes("http://flat.example/announce"),
                ]),
            );
        }

        let meta = Metainfo::from_bencode(&value).unwrap();
        assert_eq!(meta.announce_list.len(), 3);
        assert_eq!(
            meta.tracker_urls(),
            [
                "http://tracker.example/announce",
                "udp://backup.example:6969",
                "http://flat.example/announce",
            ]
        );
    }

    #[tokio::test]
    async fn test_load_torrent_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.torrent");
        tokio::fs::write(&path, encode(&torrent(single_file_info(10, 16, 1))))
            .await
            .unwrap();

        let meta = load_torrent_file(&path).await.unwrap();
        assert_eq!(meta.info.total_length, 10);
    }
}
