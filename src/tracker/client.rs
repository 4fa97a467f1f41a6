use super::{PeerEndpoint, TrackerRequest, TrackerResponse, TrackerScheme, UdpTracker};
use crate::bencode::decode_prefix;
use crate::error::{BittorrentError, Result};
use reqwest::Client;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Client for communicating with BitTorrent trackers over HTTP(S) and UDP
#[derive(Debug, Clone)]
pub struct TrackerClient {
    client: Client,
    udp: UdpTracker,
}

impl TrackerClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            udp: UdpTracker::default(),
        })
    }

    pub fn with_udp_timeout(mut self, timeout: Duration) -> Self {
        self.udp = UdpTracker::new(timeout);
        self
    }

    /// Announce to one tracker, dispatching on the URL scheme
    pub async fn announce(&self, tracker_url: &str, request: &TrackerRequest) -> Result<TrackerResponse> {
        match TrackerScheme::classify(tracker_url) {
            Some(TrackerScheme::Http) => self.announce_http(tracker_url, request).await,
            Some(TrackerScheme::Udp) => self.udp.announce(tracker_url, request).await,
            None => Err(BittorrentError::TrackerFailure(format!(
                "unsupported tracker scheme: {}",
                tracker_url
            ))),
        }
    }

    /// Send a request to an HTTP tracker and get the peer list
    pub async fn announce_http(&self, tracker_url: &str, request: &TrackerRequest) -> Result<TrackerResponse> {
        info!("Announcing to tracker: {}", tracker_url);

        let url = request.announce_url(tracker_url)?;

        debug!("Tracker request URL: {}", url);

        let response = self.client.get(url).send().await?;

        let status = response.status();
        let body = response.bytes().await?;

        debug!("Tracker response status: {}, body length: {}", status, body.len());

        if !status.is_success() {
            return Err(BittorrentError::TrackerFailure(format!(
                "HTTP error: {}",
                status
            )));
        }

        // Some trackers append a newline after the dictionary
        let (decoded, _) = decode_prefix(&body)?;
        let tracker_response = TrackerResponse::from_bencode(&decoded)?;

        info!(
            "Received {} peers from tracker (interval: {}s)",
            tracker_response.peers.len(),
            tracker_response.interval
        );

        Ok(tracker_response)
    }

    /// Query every tracker concurrently and concatenate the peer lists of
    /// those that answered. Individual failures are logged and skipped;
    /// the call only fails when no tracker answered at all. Duplicate
    /// endpoints across trackers are kept.
    pub async fn discover_peers(&self, tracker_urls: &[String], request: &TrackerRequest) -> Result<Vec<PeerEndpoint>> {
        let mut tasks = JoinSet::new();

        for url in tracker_urls {
            if TrackerScheme::classify(url).is_none() {
                info!("Skipping tracker with unsupported scheme: {}", url);
                continue;
            }

            let client = self.clone();
            let url = url.clone();
            let request = request.clone();
            tasks.spawn(async move {
                let result = client.announce(&url, &request).await;
                (url, result)
            });
        }

        if tasks.is_empty() {
            return Err(BittorrentError::TrackerFailure(
                "no tracker with a supported scheme".to_string(),
            ));
        }

        let queried = tasks.len();
        let mut answered = 0;
        let mut peers = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((url, Ok(response))) => {
                    debug!("Tracker {} returned {} peers", url, response.peers.len());
                    answered += 1;
                    peers.extend(response.peers);
                }
                Ok((url, Err(e))) => warn!("Tracker {} failed: {}", url, e),
                Err(e) => warn!("Tracker task failed: {}", e),
            }
        }

        if answered == 0 {
            return Err(BittorrentError::TrackerFailure(format!(
                "all {} trackers failed",
                queried
            )));
        }

        info!(
            "{} of {} trackers answered with {} peers in total",
            answered,
            queried,
            peers.len()
        );

        Ok(peers)
    }
}
