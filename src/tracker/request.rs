use crate::error::Result;
use url::Url;

/// Events sent to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerEvent {
    Started,
    Stopped,
    Completed,
}

impl TrackerEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerEvent::Started => "started",
            TrackerEvent::Stopped => "stopped",
            TrackerEvent::Completed => "completed",
        }
    }

    /// Event code in the UDP announce packet
    pub fn as_udp_id(&self) -> u32 {
        match self {
            TrackerEvent::Completed => 1,
            TrackerEvent::Started => 2,
            TrackerEvent::Stopped => 3,
        }
    }
}

/// Request parameters for tracker communication
#[derive(Debug, Clone)]
pub struct TrackerRequest {
    /// SHA1 hash of the info dictionary
    pub info_hash: [u8; 20],
    /// Unique peer ID
    pub peer_id: [u8; 20],
    /// Advertised listening port; advisory since inbound connections are not accepted
    pub port: u16,
    /// Total amount uploaded
    pub uploaded: u64,
    /// Total amount downloaded
    pub downloaded: u64,
    /// Number of bytes left to download
    pub left: u64,
    /// Event (optional)
    pub event: Option<TrackerEvent>,
    /// Request compact peer list format
    pub compact: bool,
}

impl TrackerRequest {
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20], port: u16, left: u64) -> Self {
        Self {
            info_hash,
            peer_id,
            port,
            uploaded: 0,
            downloaded: 0,
            left,
            event: Some(TrackerEvent::Started),
            compact: true,
        }
    }

    /// Build the announce query string. Binary fields are percent-encoded
    /// byte by byte.
    pub fn to_query_string(&self) -> String {
        let mut params = vec![
            ("info_hash", percent_encode(&self.info_hash)),
            ("peer_id", percent_encode(&self.peer_id)),
            ("port", self.port.to_string()),
            ("uploaded", self.uploaded.to_string()),
            ("downloaded", self.downloaded.to_string()),
            ("left", self.left.to_string()),
            ("compact", if self.compact { "1" } else { "0" }.to_string()),
        ];

        if let Some(event) = &self.event {
            params.push(("event", event.as_str().to_string()));
        }

        params
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Append the announce parameters to a tracker URL, keeping any query
    /// the URL already carries (e.g. a passkey).
    pub fn announce_url(&self, tracker_url: &str) -> Result<Url> {
        let mut url = Url::parse(tracker_url)?;
        let query = match url.query() {
            Some(existing) if !existing.is_empty() => {
                format!("{}&{}", existing, self.to_query_string())
            }
            _ => self.to_query_string(),
        };
        url.set_query(Some(&query));
        Ok(url)
    }
}

/// `%XX` for every byte outside the RFC 3986 unreserved set. Form
/// encoding is avoided: it turns 0x20 into `+`, which trackers read as 0x2B.
fn percent_encode(raw: &[u8]) -> String {
    raw.iter()
        .map(|&b| {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
                (b as char).to_string()
            } else {
                format!("%{:02X}", b)
            }
        })
        .collect()
}
