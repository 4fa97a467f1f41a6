use crate::error::{BittorrentError, Result};
use crate::peer::{PeerConnection, PeerMessage};
use crate::piece::{PieceDownload, PieceResult, PieceWork, WorkQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// What every worker of one download shares
#[derive(Debug, Clone)]
pub(crate) struct WorkerContext {
    pub queue: Arc<WorkQueue>,
    pub results: mpsc::Sender<PieceResult>,
    pub piece_timeout: Duration,
    pub idle_timeout: Duration,
}

/// Pulls pieces from the shared queue and fetches them from one peer
pub(crate) struct PeerWorker<S = TcpStream> {
    conn: PeerConnection<S>,
    ctx: WorkerContext,
}

impl<S: AsyncRead + AsyncWrite + Unpin> PeerWorker<S> {
    pub fn new(conn: PeerConnection<S>, ctx: WorkerContext) -> Self {
        Self { conn, ctx }
    }

    /// Work until the peer fails, goes quiet, or results are no longer
    /// wanted. The piece in hand, if any, is always returned to the queue.
    pub async fn run(mut self) {
        let addr = self.conn.addr();

        match self.serve().await {
            Ok(()) => debug!("Worker for {} finished", addr),
            Err(e) if e.is_peer_local() => warn!("Dropping peer {}: {}", addr, e),
            Err(e) => error!("Worker for {} failed: {}", addr, e),
        }

        self.conn.close().await;
    }

    async fn serve(&mut self) -> Result<()> {
        self.conn.send_interested().await?;

        let mut misses = 0usize;

        loop {
            let work = self.ctx.queue.pop().await;

            if !self.conn.has_piece(work.index) {
                self.ctx.queue.push(work);
                misses += 1;

                // Went through the whole queue without a match
                if misses > self.ctx.queue.len() {
                    misses = 0;
                    if !self.wait_for_news().await? {
                        return Ok(());
                    }
                } else {
                    tokio::task::yield_now().await;
                }
                continue;
            }

            misses = 0;

            if let Some(result) = self.process(work).await? {
                if self.ctx.results.send(result).await.is_err() {
                    return Ok(());
                }
            }
        }
    }

    /// Wait for any message from a peer that has none of the queued
    /// pieces. Returns false if it stays silent for the idle timeout.
    async fn wait_for_news(&mut self) -> Result<bool> {
        debug!(
            "{} has none of the {} queued pieces, waiting",
            self.conn.addr(),
            self.ctx.queue.len()
        );

        self.conn
            .set_deadline(Some(Instant::now() + self.ctx.idle_timeout));
        let outcome = self.conn.receive_message().await;
        self.conn.set_deadline(None);

        match outcome {
            Ok(_) => Ok(true),
            Err(BittorrentError::Timeout(_)) => {
                info!("Retiring idle peer {}", self.conn.addr());
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch and verify one piece. A piece that fails its hash check goes
    /// back to the queue and the worker carries on; any other failure
    /// requeues the piece and is returned.
    pub async fn process(&mut self, work: PieceWork) -> Result<Option<PieceResult>> {
        self.conn
            .set_deadline(Some(Instant::now() + self.ctx.piece_timeout));
        let fetched = fetch_piece(&mut self.conn, &work).await;
        self.conn.set_deadline(None);

        let data = match fetched {
            Ok(data) => data,
            Err(e) => {
                self.ctx.queue.push(work);
                return Err(e);
            }
        };

        if !work.verify(&data) {
            let failure = BittorrentError::IntegrityFailure { index: work.index };
            warn!("{} (from {})", failure, self.conn.addr());
            self.ctx.queue.push(work);
            return Ok(None);
        }

        debug!("Piece {} verified from {}", work.index, self.conn.addr());

        Ok(Some(PieceResult {
            index: work.index,
            data,
        }))
    }
}

/// Request blocks with a bounded backlog while unchoked and collect them
/// until the piece is whole
async fn fetch_piece<S>(conn: &mut PeerConnection<S>, work: &PieceWork) -> Result<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut piece = PieceDownload::new(work);

    while !piece.is_complete() {
        if !conn.is_choked() {
            while let Some(block) = piece.next_request() {
                conn.send_message(&PeerMessage::Request { block }).await?;
            }
        }

        match conn.receive_message().await? {
            PeerMessage::Piece {
                piece_index,
                offset,
                data,
            } => piece.add_block(piece_index, offset, &data)?,
            PeerMessage::Choke => piece.on_choke(),
            _ => {}
        }
    }

    Ok(piece.into_data())
}
