use crate::error::Result;
use crate::torrent::TorrentInfo;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Lays a completed download out on disk. A single-file torrent becomes
/// `<dir>/<name>`; a multi-file torrent becomes a `<dir>/<name>/` tree.
pub struct StorageManager {
    /// File or directory the torrent is written to
    root: PathBuf,
    /// Files in the torrent
    files: Vec<FileEntry>,
    /// Total length of all files
    total_length: u64,
}

#[derive(Debug)]
struct FileEntry {
    path: PathBuf,
    length: u64,
    offset: u64, // Global offset in the torrent
}

impl StorageManager {
    pub fn new<P: AsRef<Path>>(download_dir: P, torrent_info: &TorrentInfo) -> Self {
        let root = download_dir.as_ref().join(&torrent_info.name);

        let mut files = Vec::with_capacity(torrent_info.files.len());
        let mut offset = 0u64;

        if torrent_info.is_multi_file {
            for file_info in &torrent_info.files {
                let mut file_path = root.clone();
                for component in &file_info.path {
                    file_path.push(component);
                }

                files.push(FileEntry {
                    path: file_path,
                    length: file_info.length,
                    offset,
                });

                offset += file_info.length;
            }
        } else {
            files.push(FileEntry {
                path: root.clone(),
                length: torrent_info.total_length,
                offset: 0,
            });
        }

        Self {
            root,
            files,
            total_length: torrent_info.total_length,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write the assembled payload across the torrent's files and return
    /// the path of the top-level file or directory
    pub async fn write_all(&self, data: &[u8]) -> Result<PathBuf> {
        debug_assert_eq!(data.len() as u64, self.total_length);

        for file_entry in &self.files {
            if let Some(parent) = file_entry.path.parent() {
                fs::create_dir_all(parent).await?;
            }

            let start = file_entry.offset as usize;
            let end = (file_entry.offset + file_entry.length) as usize;

            let mut file = File::create(&file_entry.path).await?;
            file.write_all(&data[start..end]).await?;
            file.flush().await?;

            debug!(
                "Wrote {} bytes to {:?}",
                file_entry.length, file_entry.path
            );
        }

        info!(
            "Saved {} files, {} bytes total, to {}",
            self.files.len(),
            self.total_length,
            self.root.display()
        );

        Ok(self.root.clone())
    }
}
