//! Typed operations over the provider's REST API.

mod debrid;
mod types;

pub use debrid::DebridClient;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

use crate::http::HttpError;

/// Errors from provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("torrent not found")]
    TorrentNotFound,

    /// The hoster no longer serves this file.
    #[error("hoster unavailable")]
    HosterUnavailable,

    /// Account traffic allowance exhausted for this hoster.
    #[error("traffic exceeded")]
    TrafficExceeded,

    /// Link check returned 404; the link is terminally broken.
    #[error("link is no longer valid")]
    LinkBroken,

    /// 503 persisted through immediate retries. Eligible for the cross-cycle
    /// retry queue.
    #[error("server unavailable after retries")]
    ServerUnavailable,

    /// 429 persisted through immediate backoff. Never queued.
    #[error("rate limit exceeded after retries")]
    RateLimitExceeded,

    #[error("no suitable video files in torrent")]
    NoVideoFiles,

    #[error("torrent failed with status {0}")]
    TorrentFailed(&'static str),

    #[error("timed out waiting for torrent {0}")]
    WaitTimeout(String),

    /// Provider error code without a dedicated mapping.
    #[error("provider error {code}: {message}")]
    Api { code: i32, message: String },

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Http(#[from] HttpError),
}

impl ProviderError {
    /// Whether this failure should be parked in the cross-cycle retry queue.
    pub fn is_queueable(&self) -> bool {
        match self {
            ProviderError::ServerUnavailable => true,
            ProviderError::Status { status, .. } => matches!(status, 502 | 503 | 504),
            _ => false,
        }
    }

    /// Coarse class recorded on queued retry items.
    pub fn error_class(&self) -> &'static str {
        match self {
            ProviderError::ServerUnavailable => "503",
            ProviderError::Status { status: 502, .. } => "502",
            ProviderError::Status { status: 503, .. } => "503",
            ProviderError::Status { status: 504, .. } => "504",
            ProviderError::RateLimitExceeded => "429",
            _ => "other",
        }
    }
}

/// Map a provider error code to a typed error.
pub(crate) fn map_error_code(code: i32, message: String) -> ProviderError {
    match code {
        // File removed, link nerfed, hoster down.
        19 | 24 | 35 => ProviderError::HosterUnavailable,
        // Traffic exhausted variants.
        23 | 34 | 36 => ProviderError::TrafficExceeded,
        _ => ProviderError::Api { code, message },
    }
}

/// Operations the sync engine needs from the remote provider.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Fetch all torrents, partitioned into downloaded and dead.
    async fn list_torrents(&self) -> Result<TorrentLists, ProviderError>;

    /// Fetch detailed info for one torrent.
    async fn torrent_info(&self, id: &str) -> Result<TorrentDetails, ProviderError>;

    /// Add a torrent by content hash. Returns the new torrent id.
    async fn add_magnet(&self, hash: &str) -> Result<String, ProviderError>;

    /// Select files within a torrent for caching.
    async fn select_files(&self, id: &str, file_ids: &[i64]) -> Result<(), ProviderError>;

    /// Select all video files meeting the size floor. Returns how many.
    async fn select_video_files(&self, id: &str) -> Result<usize, ProviderError>;

    /// Poll a torrent until it is downloaded, auto-selecting video files when
    /// the provider asks for a selection.
    async fn wait_for_download(
        &self,
        id: &str,
        max_attempts: u32,
    ) -> Result<TorrentDetails, ProviderError>;

    /// Delete a torrent.
    async fn delete_torrent(&self, id: &str) -> Result<(), ProviderError>;

    /// Fetch all downloads: streamable only, deduplicated by source link.
    async fn list_downloads(&self) -> Result<Vec<Download>, ProviderError>;

    /// Delete a download.
    async fn delete_download(&self, id: &str) -> Result<(), ProviderError>;

    /// Unrestrict a source link into a streamable download.
    async fn unrestrict_link(&self, link: &str) -> Result<Download, ProviderError>;

    /// Diagnostic: verify a link is still valid.
    async fn check_link(&self, link: &str) -> Result<(), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_error_code_hoster() {
        for code in [19, 24, 35] {
            assert!(matches!(
                map_error_code(code, String::new()),
                ProviderError::HosterUnavailable
            ));
        }
    }

    #[test]
    fn test_map_error_code_traffic() {
        for code in [23, 34, 36] {
            assert!(matches!(
                map_error_code(code, String::new()),
                ProviderError::TrafficExceeded
            ));
        }
    }

    #[test]
    fn test_map_error_code_passthrough() {
        let err = map_error_code(8, "bad token".to_string());
        match err {
            ProviderError::Api { code, message } => {
                assert_eq!(code, 8);
                assert_eq!(message, "bad token");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_queueable_classification() {
        assert!(ProviderError::ServerUnavailable.is_queueable());
        assert!(ProviderError::Status {
            status: 502,
            body: String::new()
        }
        .is_queueable());
        assert!(ProviderError::Status {
            status: 504,
            body: String::new()
        }
        .is_queueable());

        assert!(!ProviderError::RateLimitExceeded.is_queueable());
        assert!(!ProviderError::HosterUnavailable.is_queueable());
        assert!(!ProviderError::TrafficExceeded.is_queueable());
        assert!(!ProviderError::Status {
            status: 400,
            body: String::new()
        }
        .is_queueable());
    }

    #[test]
    fn test_error_class() {
        assert_eq!(ProviderError::ServerUnavailable.error_class(), "503");
        assert_eq!(ProviderError::RateLimitExceeded.error_class(), "429");
        assert_eq!(ProviderError::HosterUnavailable.error_class(), "other");
    }
}
