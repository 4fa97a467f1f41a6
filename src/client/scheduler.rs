use super::worker::{PeerWorker, WorkerContext};
use crate::error::{BittorrentError, Result};
use crate::peer::{PeerConnection, BITFIELD_TIMEOUT, HANDSHAKE_TIMEOUT};
use crate::piece::{PieceWork, WorkQueue};
use crate::torrent::TorrentInfo;
use crate::tracker::PeerEndpoint;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Limits and timeouts for one download
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Peers connected at the same time
    pub max_peers: usize,
    /// TCP connect plus handshake
    pub handshake_timeout: Duration,
    pub bitfield_timeout: Duration,
    /// Whole-piece download deadline
    pub piece_timeout: Duration,
    /// How long a peer with nothing useful is kept around
    pub idle_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_peers: 50,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            bitfield_timeout: BITFIELD_TIMEOUT,
            piece_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

/// Live counters of a running download
#[derive(Debug, Default)]
pub struct DownloadProgress {
    pieces_done: AtomicUsize,
    bytes_done: AtomicU64,
    active_peers: AtomicUsize,
}

impl DownloadProgress {
    pub fn pieces_done(&self) -> usize {
        self.pieces_done.load(Ordering::Relaxed)
    }

    pub fn bytes_done(&self) -> u64 {
        self.bytes_done.load(Ordering::Relaxed)
    }

    pub fn active_peers(&self) -> usize {
        self.active_peers.load(Ordering::Relaxed)
    }
}

/// Counts one connected worker in `active_peers` until dropped, which
/// also covers workers cancelled at shutdown
struct ActivePeer(Arc<DownloadProgress>);

impl ActivePeer {
    fn enter(progress: Arc<DownloadProgress>) -> Self {
        progress.active_peers.fetch_add(1, Ordering::Relaxed);
        Self(progress)
    }
}

impl Drop for ActivePeer {
    fn drop(&mut self) {
        self.0.active_peers.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Fans pieces out to one worker per peer and assembles the verified
/// results into a single buffer
pub struct Scheduler {
    info_hash: [u8; 20],
    peer_id: [u8; 20],
    piece_length: u64,
    total_length: u64,
    works: Vec<PieceWork>,
    config: SchedulerConfig,
    progress: Arc<DownloadProgress>,
}

impl Scheduler {
    pub fn new(
        info: &TorrentInfo,
        info_hash: [u8; 20],
        peer_id: [u8; 20],
        config: SchedulerConfig,
    ) -> Self {
        Self {
            info_hash,
            peer_id,
            piece_length: info.piece_length,
            total_length: info.total_length,
            works: PieceWork::all_from(info),
            config,
            progress: Arc::new(DownloadProgress::default()),
        }
    }

    pub fn progress(&self) -> Arc<DownloadProgress> {
        self.progress.clone()
    }

    /// Download every piece from `peers`. Returns the whole payload once
    /// each piece has been verified, or `DownloadStalled` when all workers
    /// are gone before that.
    pub async fn run(&self, peers: &[PeerEndpoint]) -> Result<Vec<u8>> {
        let total = self.works.len();
        let mut buf = vec![0u8; self.total_length as usize];

        if total == 0 {
            return Ok(buf);
        }

        if peers.is_empty() {
            return Err(BittorrentError::NoPeers);
        }

        info!(
            "Downloading {} pieces from {} peers (at most {} at once)",
            total,
            peers.len(),
            self.config.max_peers
        );

        let queue = Arc::new(WorkQueue::new(self.works.clone()));
        let (results, mut rx) = mpsc::channel(total);
        let ctx = WorkerContext {
            queue,
            results,
            piece_timeout: self.config.piece_timeout,
            idle_timeout: self.config.idle_timeout,
        };

        let permits = Arc::new(Semaphore::new(self.config.max_peers.max(1)));
        let mut workers = JoinSet::new();

        for endpoint in peers {
            let addr = endpoint.addr;
            let ctx = ctx.clone();
            let permits = permits.clone();
            let progress = self.progress.clone();
            let (info_hash, peer_id) = (self.info_hash, self.peer_id);
            let (handshake_timeout, bitfield_timeout) =
                (self.config.handshake_timeout, self.config.bitfield_timeout);

            workers.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };

                let conn = match PeerConnection::connect(
                    addr,
                    info_hash,
                    peer_id,
                    handshake_timeout,
                    bitfield_timeout,
                )
                .await
                {
                    Ok(conn) => conn,
                    Err(e) => {
                        debug!("Could not use peer {}: {}", addr, e);
                        return;
                    }
                };

                let _active = ActivePeer::enter(progress);
                PeerWorker::new(conn, ctx).run().await;
            });
        }

        // Workers hold the only senders now
        drop(ctx);

        let mut done = vec![false; total];
        let mut completed = 0;

        while completed < total {
            let Some(result) = rx.recv().await else {
                workers.shutdown().await;
                return Err(BittorrentError::DownloadStalled { completed, total });
            };

            if done[result.index] {
                debug!("Ignoring second copy of piece {}", result.index);
                continue;
            }

            let begin = result.index as u64 * self.piece_length;
            let end = (begin + self.piece_length).min(self.total_length);
            buf[begin as usize..end as usize].copy_from_slice(&result.data);

            done[result.index] = true;
            completed += 1;
            self.progress.pieces_done.fetch_add(1, Ordering::Relaxed);
            self.progress
                .bytes_done
                .fetch_add(result.data.len() as u64, Ordering::Relaxed);

            info!(
                "Downloaded piece {} ({}/{}, {:.1}%) with {} peers",
                result.index,
                completed,
                total,
                completed as f64 / total as f64 * 100.0,
                self.progress.active_peers()
            );
        }

        // Idle workers are still waiting on the queue
        workers.shutdown().await;

        Ok(buf)
    }
}
