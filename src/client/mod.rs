mod scheduler;
mod worker;

pub use scheduler::{DownloadProgress, Scheduler, SchedulerConfig};

use crate::error::Result;
use crate::storage::StorageManager;
use crate::torrent::Metainfo;
use crate::tracker::{resolve_peer_id, TrackerClient, TrackerRequest};
use std::path::{Path, PathBuf};
use tracing::info;

/// Configuration for the BitTorrent client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub download_dir: PathBuf,
    /// Reported to trackers; nothing listens on it
    pub listen_port: u16,
    pub max_peers: usize,
    /// Persisted peer id, if any
    pub peer_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("./downloads"),
            listen_port: 6881,
            max_peers: 50,
            peer_id: None,
        }
    }
}

/// Main BitTorrent client
pub struct TorrentClient {
    config: ClientConfig,
    peer_id: [u8; 20],
    tracker: TrackerClient,
}

impl TorrentClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let peer_id = resolve_peer_id(config.peer_id.as_deref());
        info!(
            "Client initialized with peer_id: {}",
            String::from_utf8_lossy(&peer_id)
        );

        Ok(Self {
            config,
            peer_id,
            tracker: TrackerClient::new()?,
        })
    }

    /// Replace the tracker client, e.g. to shorten its timeouts
    pub fn with_tracker(mut self, tracker: TrackerClient) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn peer_id(&self) -> &[u8; 20] {
        &self.peer_id
    }

    /// Download a torrent and return where it was saved
    pub async fn download(&self, torrent_path: &Path) -> Result<PathBuf> {
        info!("Starting download for: {}", torrent_path.display());

        let metainfo = crate::torrent::load_torrent_file(torrent_path).await?;
        self.download_metainfo(&metainfo).await
    }

    pub async fn download_metainfo(&self, metainfo: &Metainfo) -> Result<PathBuf> {
        info!("Torrent: {}", metainfo.info.name);
        info!("Total size: {} bytes", metainfo.info.total_length);
        info!("Pieces: {}", metainfo.info.piece_count());
        info!("Info hash: {}", metainfo.info_hash_hex());

        let peers = if metainfo.info.piece_count() == 0 {
            Vec::new()
        } else {
            let request = TrackerRequest::new(
                metainfo.info_hash,
                self.peer_id,
                self.config.listen_port,
                metainfo.info.total_length,
            );
            self.tracker
                .discover_peers(&metainfo.tracker_urls(), &request)
                .await?
        };

        let scheduler = Scheduler::new(
            &metainfo.info,
            metainfo.info_hash,
            self.peer_id,
            SchedulerConfig {
                max_peers: self.config.max_peers,
                ..SchedulerConfig::default()
            },
        );
        let data = scheduler.run(&peers).await?;

        let storage = StorageManager::new(&self.config.download_dir, &metainfo.info);
        let saved = storage.write_all(&data).await?;

        info!("Download complete: {}", saved.display());

        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bencode::{encode, BencodeValue};
    use crate::error::BittorrentError;
    use crate::test_support::{sample_data, spawn_udp_tracker, FakePeer};
    use crate::torrent::parse_torrent;
    use sha1::{Digest, Sha1};

    fn torrent_bytes(announce: &str, name: &str, piece_length: usize, data: &[u8]) -> Vec<u8> {
        let pieces: Vec<u8> = data
            .chunks(piece_length)
            .flat_map(|chunk| Sha1::digest(chunk).to_vec())
            .collect();

        encode(&BencodeValue::dict([
            ("announce", BencodeValue::bytes(announce)),
            (
                "info",
                BencodeValue::dict([
                    ("name", BencodeValue::bytes(name)),
                    ("length", BencodeValue::Integer(data.len() as i64)),
                    ("piece length", BencodeValue::Integer(piece_length as i64)),
                    ("pieces", BencodeValue::String(pieces)),
                ]),
            ),
        ]))
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.download_dir, PathBuf::from("./downloads"));
        assert_eq!(config.listen_port, 6881);
        assert_eq!(config.max_peers, 50);
        assert!(config.peer_id.is_none());
    }

    #[test]
    fn test_peer_id_from_config() {
        let config = ClientConfig {
            peer_id: Some("-XX0001-abcdefghijkl".to_string()),
            ..ClientConfig::default()
        };
        let client = TorrentClient::new(config).unwrap();
        assert_eq!(client.peer_id(), b"-XX0001-abcdefghijkl");
    }

    #[tokio::test]
    async fn test_download_end_to_end() {
        let data = sample_data(100000);
        let placeholder = torrent_bytes("udp://127.0.0.1:1", "payload.bin", 32768, &data);
        let info_hash = parse_torrent(&placeholder).unwrap().info_hash;

        let seed = FakePeer::new(info_hash, &data, 32768).spawn().await;
        let tracker = spawn_udp_tracker(vec![seed]).await;

        let raw = torrent_bytes(&format!("udp://{}", tracker), "payload.bin", 32768, &data);
        let metainfo = parse_torrent(&raw).unwrap();
        assert_eq!(metainfo.info_hash, info_hash);

        let dir = tempfile::tempdir().unwrap();
        let torrent_path = dir.path().join("payload.torrent");
        tokio::fs::write(&torrent_path, &raw).await.unwrap();

        let client = TorrentClient::new(ClientConfig {
            download_dir: dir.path().join("out"),
            ..ClientConfig::default()
        })
        .unwrap();

        let saved = client.download(&torrent_path).await.unwrap();
        assert_eq!(saved, dir.path().join("out").join("payload.bin"));
        assert!(tokio::fs::read(&saved).await.unwrap() == data);
    }

    #[tokio::test]
    async fn test_download_without_answering_tracker() {
        let silent = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let raw = torrent_bytes(
            &format!("udp://{}", silent.local_addr().unwrap()),
            "payload.bin",
            32768,
            &sample_data(1000),
        );
        let metainfo = parse_torrent(&raw).unwrap();

        let client = TorrentClient::new(ClientConfig::default())
            .unwrap()
            .with_tracker(
                TrackerClient::new()
                    .unwrap()
                    .with_udp_timeout(std::time::Duration::from_millis(100)),
            );

        assert!(matches!(
            client.download_metainfo(&metainfo).await,
            Err(BittorrentError::TrackerFailure(_))
        ));
    }
}
