use anyhow::Result;
use bitfetch::client::{ClientConfig, TorrentClient};
use bitfetch::torrent::{load_torrent_file, FileInfo, FileNode, Metainfo};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "bitfetch")]
#[command(about = "A download-only BitTorrent client", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a torrent file
    Download {
        /// Path to the .torrent file
        #[arg(short, long)]
        torrent: PathBuf,

        /// Download directory
        #[arg(short, long, default_value = "./downloads")]
        output: PathBuf,

        /// Port reported to trackers
        #[arg(short, long, default_value = "6881")]
        port: u16,

        /// Maximum number of peers to connect to
        #[arg(short, long, default_value = "50")]
        max_peers: usize,

        /// Peer id to present, regenerated unless exactly 20 bytes
        #[arg(long)]
        peer_id: Option<String>,
    },

    /// Show information about a torrent file
    Info {
        /// Path to the .torrent file
        torrent: PathBuf,

        /// Print the metadata as JSON
        #[arg(long)]
        json: bool,

        /// Include piece hashes
        #[arg(long)]
        pieces: bool,
    },

    /// Print the file tree of a torrent
    Tree {
        /// Path to the .torrent file
        torrent: PathBuf,
    },
}

/// JSON view of a torrent's metadata
#[derive(Serialize)]
struct TorrentSummary<'a> {
    name: &'a str,
    info_hash: String,
    trackers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_by: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    creation_date: Option<i64>,
    piece_length: u64,
    piece_count: usize,
    total_length: u64,
    files: &'a [FileInfo],
    #[serde(skip_serializing_if = "Option::is_none")]
    tree: Option<&'a FileNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pieces: Option<Vec<String>>,
}

impl<'a> TorrentSummary<'a> {
    fn new(metainfo: &'a Metainfo, with_pieces: bool) -> Self {
        let info = &metainfo.info;
        Self {
            name: &info.name,
            info_hash: metainfo.info_hash_hex(),
            trackers: metainfo.tracker_urls(),
            comment: metainfo.comment.as_deref(),
            created_by: metainfo.created_by.as_deref(),
            creation_date: metainfo.created_at,
            piece_length: info.piece_length,
            piece_count: info.piece_count(),
            total_length: info.total_length,
            files: &info.files,
            tree: info.file_tree.as_ref(),
            pieces: with_pieces
                .then(|| info.pieces.iter().map(|p| hex::encode(p.as_bytes())).collect()),
        }
    }
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Download {
                torrent,
                output,
                port,
                max_peers,
                peer_id,
            } => {
                let config = ClientConfig {
                    download_dir: output.clone(),
                    listen_port: *port,
                    max_peers: *max_peers,
                    peer_id: peer_id.clone(),
                };

                let client = TorrentClient::new(config)?;
                let saved = client.download(torrent).await?;
                println!("Saved to {}", saved.display());
            }

            Commands::Info {
                torrent,
                json,
                pieces,
            } => {
                let metainfo = load_torrent_file(torrent).await?;
                if *json {
                    let summary = TorrentSummary::new(&metainfo, *pieces);
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                } else {
                    show_torrent_info(&metainfo, *pieces);
                }
            }

            Commands::Tree { torrent } => {
                show_tree(torrent).await?;
            }
        }

        Ok(())
    }
}

fn show_torrent_info(metainfo: &Metainfo, with_pieces: bool) {
    let info = &metainfo.info;
    let mut rows = vec![
        ("name", info.name.clone()),
        ("info hash", metainfo.info_hash_hex()),
        ("size", format!("{} bytes", info.total_length)),
        (
            "pieces",
            format!("{} x {} bytes", info.piece_count(), info.piece_length),
        ),
    ];
    if let Some(comment) = &metainfo.comment {
        rows.push(("comment", comment.clone()));
    }
    if let Some(created_by) = &metainfo.created_by {
        rows.push(("created by", created_by.clone()));
    }
    for url in metainfo.tracker_urls() {
        rows.push(("tracker", url));
    }
    for (label, value) in rows {
        println!("{:<12} {}", label, value);
    }

    if info.files.len() > 1 {
        println!();
        for file in &info.files {
            println!("{:>14}  {}", file.length, file.path.join("/"));
        }
    }

    if with_pieces {
        println!();
        for (index, hash) in info.pieces.iter().enumerate() {
            println!("{:>6} {}", index, hex::encode(hash.as_bytes()));
        }
    }
}

async fn show_tree(torrent_path: &Path) -> Result<()> {
    let metainfo = load_torrent_file(torrent_path).await?;

    match &metainfo.info.file_tree {
        Some(tree) => print!("{}", tree.render()),
        None => println!(
            "{} ({} bytes)",
            metainfo.info.name, metainfo.info.total_length
        ),
    }

    Ok(())
}
