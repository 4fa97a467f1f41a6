use crate::bencode::{encode, BencodeValue};
use crate::error::{BittorrentError, Result};
use super::{FileNode, Pieces};
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;

/// Represents a file in a torrent, in torrent order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub path: Vec<String>,
    pub length: u64,
}

/// Information about the torrent contents
#[derive(Debug, Clone)]
pub struct TorrentInfo {
    /// Suggested name for the file or directory
    pub name: String,
    /// Number of bytes in each piece
    pub piece_length: u64,
    /// SHA1 hashes of all pieces
    pub pieces: Pieces,
    /// Files in the torrent. A single-file torrent has one entry named `name`.
    pub files: Vec<FileInfo>,
    /// Directory tree rooted at `name`, only for multi-file torrents
    pub file_tree: Option<FileNode>,
    /// Total length of all files
    pub total_length: u64,
    pub is_multi_file: bool,
}

type Dict = BTreeMap<Vec<u8>, BencodeValue>;

fn invalid(msg: impl Into<String>) -> BittorrentError {
    BittorrentError::InvalidTorrentFile(msg.into())
}

fn non_negative(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| invalid(format!("'{}' must not be negative", field)))
}

/// Reject path segments that would escape the download directory
fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains('/')
        || segment.contains('\\')
    {
        return Err(invalid(format!("unsafe path segment {:?}", segment)));
    }
    Ok(())
}

impl TorrentInfo {
    fn from_bencode(dict: &Dict) -> Result<Self> {
        // A missing name is tolerated; the protocol never needs it
        let name = match dict.get(b"name".as_ref()).and_then(|v| v.as_bytes()) {
            Some(raw) if !raw.is_empty() => String::from_utf8_lossy(raw).into_owned(),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        validate_segment(&name)?;

        let piece_length = dict
            .get(b"piece length".as_ref())
            .and_then(|v| v.as_integer())
            .ok_or_else(|| invalid("missing or non-integer 'piece length'"))?;
        if piece_length <= 0 {
            return Err(invalid("'piece length' must be positive"));
        }
        let piece_length = piece_length as u64;

        let pieces_bytes = dict
            .get(b"pieces".as_ref())
            .and_then(|v| v.as_bytes())
            .ok_or_else(|| invalid("missing or non-string 'pieces'"))?;

        let pieces = Pieces::from_bytes(pieces_bytes)?;

        let length = dict.get(b"length".as_ref());
        let files = dict.get(b"files".as_ref());

        let (files, file_tree, total_length, is_multi_file) = match (length, files) {
            (Some(length_value), None) => {
                let length = length_value
                    .as_integer()
                    .ok_or_else(|| invalid("'length' must be an integer"))?;
                let length = non_negative(length, "length")?;

                let file = FileInfo {
                    path: vec![name.clone()],
                    length,
                };

                (vec![file], None, length, false)
            }
            (None, Some(files_value)) => {
                let files = parse_file_list(files_value)?;
                let total = files.iter().try_fold(0u64, |sum, file| {
                    sum.checked_add(file.length)
                        .ok_or_else(|| invalid("total length of 'files' overflows"))
                })?;

                // Directory sums cannot exceed the checked total
                let mut tree = FileNode::directory(name.clone());
                for file in &files {
                    tree.insert(&file.path, file.length);
                }

                (files, Some(tree), total, true)
            }
            (Some(_), Some(_)) => {
                return Err(invalid("both 'length' and 'files' present"));
            }
            (None, None) => {
                return Err(invalid("missing 'length' or 'files' field"));
            }
        };

        let expected_pieces = total_length.div_ceil(piece_length);
        if pieces.len() as u64 != expected_pieces {
            return Err(invalid(format!(
                "{} piece hashes for {} bytes at piece length {} (expected {})",
                pieces.len(),
                total_length,
                piece_length,
                expected_pieces
            )));
        }

        Ok(TorrentInfo {
            name,
            piece_length,
            pieces,
            files,
            file_tree,
            total_length,
            is_multi_file,
        })
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    /// Byte length of the piece at `index`; only the final piece may be short
    pub fn piece_size(&self, index: usize) -> Option<u64> {
        if index >= self.pieces.len() {
            return None;
        }
        let begin = index as u64 * self.piece_length;
        let end = begin.saturating_add(self.piece_length).min(self.total_length);
        Some(end - begin)
    }
}

fn parse_file_list(value: &BencodeValue) -> Result<Vec<FileInfo>> {
    let list = value
        .as_list()
        .ok_or_else(|| invalid("'files' must be a list"))?;

    let mut files = Vec::with_capacity(list.len());

    for file_value in list {
        let file_dict = file_value
            .as_dict()
            .ok_or_else(|| invalid("file entry must be a dict"))?;

        let length = file_dict
            .get(b"length".as_ref())
            .and_then(|v| v.as_integer())
            .ok_or_else(|| invalid("missing file 'length'"))?;
        let length = non_negative(length, "length")?;

        let path_list = file_dict
            .get(b"path".as_ref())
            .and_then(|v| v.as_list())
            .ok_or_else(|| invalid("missing file 'path'"))?;

        if path_list.is_empty() {
            return Err(invalid("file 'path' is empty"));
        }

        let path = path_list
            .iter()
            .map(|v| {
                let segment = v
                    .as_str()
                    .ok_or_else(|| invalid("invalid path component"))?;
                validate_segment(segment)?;
                Ok(segment.to_string())
            })
            .collect::<Result<Vec<_>>>()?;

        files.push(FileInfo { path, length });
    }

    Ok(files)
}

/// Top-level metainfo structure from a .torrent file
#[derive(Debug, Clone)]
pub struct Metainfo {
    /// URL of the primary tracker
    pub announce: String,
    /// Fallback tracker URLs, tiers flattened in order
    pub announce_list: Vec<String>,
    pub comment: Option<String>,
    pub created_by: Option<String>,
    /// Creation time, seconds since the Unix epoch
    pub created_at: Option<i64>,
    /// Information about the torrent contents
    pub info: TorrentInfo,
    /// SHA1 hash of the canonically encoded info dictionary
    pub info_hash: [u8; 20],
}

impl Metainfo {
    pub fn from_bencode(value: &BencodeValue) -> Result<Self> {
        if value.as_dict().is_none() {
            return Err(invalid("torrent must be a dict"));
        }

        let announce = value
            .dict_get_str(b"announce")
            .ok_or_else(|| invalid("missing 'announce' field"))?
            .to_string();
        let announce_list = value
            .dict_get(b"announce-list")
            .and_then(BencodeValue::as_list)
            .map(flatten_announce_list)
            .unwrap_or_default();
        let comment = value.dict_get_str(b"comment").map(String::from);
        let created_by = value.dict_get_str(b"created by").map(String::from);
        let created_at = value.dict_get_int(b"creation date");

        let info_value = value
            .dict_get(b"info")
            .ok_or_else(|| invalid("missing 'info' field"))?;
        let info_dict = info_value
            .as_dict()
            .ok_or_else(|| invalid("'info' must be a dict"))?;

        let info = TorrentInfo::from_bencode(info_dict)?;
        let info_hash = calculate_info_hash(info_value);

        Ok(Metainfo {
            announce,
            announce_list,
            comment,
            created_by,
            created_at,
            info,
            info_hash,
        })
    }

    /// Every announce URL, primary first, without repeats
    pub fn tracker_urls(&self) -> Vec<String> {
        let mut urls = vec![self.announce.clone()];
        for url in &self.announce_list {
            if !urls.contains(url) {
                urls.push(url.clone());
            }
        }
        urls
    }

    /// Get the info hash as a hex string
    pub fn info_hash_hex(&self) -> String {
        hex::encode(self.info_hash)
    }
}

/// Accepts both tiered (`[[url, ..], ..]`) and flat (`[url, ..]`) lists
fn flatten_announce_list(list: &[BencodeValue]) -> Vec<String> {
    let mut urls = Vec::new();
    for entry in list {
        if let Some(url) = entry.as_str() {
            urls.push(url.to_string());
        } else if let Some(tier) = entry.as_list() {
            urls.extend(tier.iter().filter_map(|u| u.as_str().map(String::from)));
        }
    }
    urls
}

/// SHA1 over the canonical re-encoding of the info dictionary. Key order
/// is normalized by the encoder, so the digest does not depend on the
/// order keys appeared in the source.
fn calculate_info_hash(info: &BencodeValue) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(encode(info));
    hasher.finalize().into()
}
