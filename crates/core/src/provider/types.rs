//! Provider API models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Status of a torrent as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentStatus {
    Downloaded,
    Downloading,
    Dead,
    Error,
    Virus,
    WaitingFilesSelection,
    MagnetError,
    MagnetConversion,
    Queued,
    Uploading,
    Compressing,
    #[serde(other)]
    Unknown,
}

impl TorrentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentStatus::Downloaded => "downloaded",
            TorrentStatus::Downloading => "downloading",
            TorrentStatus::Dead => "dead",
            TorrentStatus::Error => "error",
            TorrentStatus::Virus => "virus",
            TorrentStatus::WaitingFilesSelection => "waiting_files_selection",
            TorrentStatus::MagnetError => "magnet_error",
            TorrentStatus::MagnetConversion => "magnet_conversion",
            TorrentStatus::Queued => "queued",
            TorrentStatus::Uploading => "uploading",
            TorrentStatus::Compressing => "compressing",
            TorrentStatus::Unknown => "unknown",
        }
    }

    /// Terminal failure states eligible for repair or abandonment.
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            TorrentStatus::Error | TorrentStatus::Dead | TorrentStatus::Virus
        )
    }
}

/// A torrent as returned by the paginated listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Torrent {
    pub id: String,
    pub filename: String,
    pub hash: String,
    pub bytes: u64,
    pub status: TorrentStatus,
    #[serde(default)]
    pub progress: f64,
    pub added: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended: Option<DateTime<Utc>>,
    #[serde(default)]
    pub links: Vec<String>,
}

/// A file within a torrent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentFile {
    pub id: i64,
    pub path: String,
    pub bytes: u64,
    #[serde(default)]
    pub selected: i32,
}

/// Detailed torrent info including the full file list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentDetails {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub original_filename: String,
    pub hash: String,
    pub bytes: u64,
    #[serde(default)]
    pub progress: f64,
    pub status: TorrentStatus,
    #[serde(default)]
    pub files: Vec<TorrentFile>,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeders: Option<u32>,
}

/// An unrestricted, currently-streamable download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Download {
    pub id: String,
    pub filename: String,
    #[serde(default, rename = "mimeType")]
    pub mime_type: String,
    pub filesize: u64,
    /// The opaque source link this download was unrestricted from.
    pub link: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub chunks: i64,
    /// The direct streamable URL.
    pub download: String,
    #[serde(default)]
    pub streamable: i32,
    pub generated: DateTime<Utc>,
}

impl Download {
    pub fn is_streamable(&self) -> bool {
        self.streamable == 1
    }

    /// Direct URLs expire 7 days after generation.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.generated + Duration::days(7)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at()
    }
}

/// Response from adding a magnet.
#[derive(Debug, Clone, Deserialize)]
pub struct AddMagnetResponse {
    pub id: String,
    #[serde(default)]
    pub uri: String,
}

/// Response from unrestricting a link.
#[derive(Debug, Clone, Deserialize)]
pub struct UnrestrictResponse {
    pub id: String,
    pub filename: String,
    #[serde(default, rename = "mimeType")]
    pub mime_type: String,
    pub filesize: u64,
    pub link: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub chunks: i64,
    #[serde(default)]
    pub download: String,
    #[serde(default)]
    pub streamable: i32,
}

impl UnrestrictResponse {
    /// Convert into a [`Download`], stamping the generation time.
    pub fn into_download(self) -> Download {
        Download {
            id: self.id,
            filename: self.filename,
            mime_type: self.mime_type,
            filesize: self.filesize,
            link: self.link,
            host: self.host,
            chunks: self.chunks,
            download: self.download,
            streamable: self.streamable,
            generated: Utc::now(),
        }
    }
}

/// Error body returned by the provider API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub error_code: i32,
}

/// Torrent listing partitioned by status.
#[derive(Debug, Clone, Default)]
pub struct TorrentLists {
    pub downloaded: Vec<Torrent>,
    pub dead: Vec<Torrent>,
}

/// A computed intent-to-materialize record for one media file.
///
/// Derived from a torrent link matched to a download; recomputed each cycle,
/// never persisted.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub torrent_id: String,
    /// Display name of the torrent, used as the folder name.
    pub torrent_name: String,
    /// Provider-supplied filename of the download.
    pub file_name: String,
    /// Direct streamable URL (the `.strm` file contents).
    pub download_url: String,
    /// Original source link, for matching and refresh.
    pub link: String,
    pub filesize: u64,
}

/// Deduplicate downloads by source link, keeping the latest `generated`.
pub fn dedupe_by_link(downloads: Vec<Download>) -> Vec<Download> {
    let mut by_link: HashMap<String, Download> = HashMap::with_capacity(downloads.len());
    for download in downloads {
        match by_link.get(&download.link) {
            Some(existing) if existing.generated >= download.generated => {}
            _ => {
                by_link.insert(download.link.clone(), download);
            }
        }
    }
    by_link.into_values().collect()
}
